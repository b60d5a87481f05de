// Integration tests for the two startup paths: registration generation and run
#[cfg(test)]
mod tests {
    use std::{
        path::Path,
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use clap::Parser;
    use hades_bridge::{
        CompositionRoot, Outcome, ShutdownReason, StartupMode, Worker,
        cli::Cli,
        core::Registration,
        utils::ShutdownToken,
    };
    use tempfile::tempdir;

    /// Records whether the host ever started it
    struct ProbeWorker {
        started: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Worker for ProbeWorker {
        fn name(&self) -> &str {
            "probe"
        }

        async fn run(&self, mut shutdown: ShutdownToken) -> eyre::Result<()> {
            self.started.store(true, Ordering::SeqCst);
            shutdown.wait_for_shutdown().await;
            Ok(())
        }
    }

    fn cli(data_dir: &Path, args: &[&str]) -> Cli {
        let data_dir = data_dir.to_str().unwrap().to_string();
        let mut argv = vec!["hades-bridge".to_string(), "--data-dir".to_string(), data_dir];
        argv.extend(args.iter().map(|a| a.to_string()));
        Cli::try_parse_from(argv).unwrap()
    }

    fn with_probe(root: &mut CompositionRoot) -> Arc<AtomicBool> {
        let started = Arc::new(AtomicBool::new(false));
        root.register_worker(Arc::new(ProbeWorker {
            started: started.clone(),
        }));
        started
    }

    /// Port with nothing listening on it
    async fn closed_port() -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_generate_yaml_skips_validation_and_host() {
        let dir = tempdir().unwrap();
        let data_dir = dir.path().join("data");

        // Nothing required is configured, so validation would fail
        let mut root = CompositionRoot::assemble(&cli(&data_dir, &["--generate-yaml"])).unwrap();
        assert_eq!(root.mode(), StartupMode::GenerateRegistration);
        let started = with_probe(&mut root);

        let outcome = root.execute().await.unwrap();
        let expected = data_dir.join("hades-registration.yaml");
        assert_eq!(outcome, Outcome::RegistrationGenerated(expected.clone()));
        assert!(expected.is_file());
        assert!(!started.load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_validation_failure_prevents_host_run() {
        let dir = tempdir().unwrap();
        let mut root = CompositionRoot::assemble(&cli(
            dir.path(),
            &["--server-url", "https://matrix.example.org"],
        ))
        .unwrap();
        assert_eq!(root.mode(), StartupMode::Run);
        let started = with_probe(&mut root);

        let error = root.execute().await.unwrap_err();
        let report = format!("{error:?}");
        assert!(report.contains("matrix.access_token"));
        assert!(report.contains("hades.server"));
        assert!(!started.load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_valid_configuration_runs_host_until_shutdown() {
        let dir = tempdir().unwrap();
        let port = closed_port().await.to_string();
        let mut root = CompositionRoot::assemble(&cli(
            dir.path(),
            &[
                "--server-url",
                "https://matrix.example.org",
                "--access-token",
                "as-token",
                "--authorization-token",
                "hs-token",
                "--hades-server",
                "127.0.0.1",
                "--hades-port",
                &port,
            ],
        ))
        .unwrap();
        let started = with_probe(&mut root);
        let shutdown = root.shutdown_handle();

        let running = tokio::spawn(root.execute());

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !started.load(Ordering::SeqCst) {
            assert!(tokio::time::Instant::now() < deadline, "host never started");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        shutdown.trigger_shutdown(ShutdownReason::Graceful);
        let outcome = tokio::time::timeout(Duration::from_secs(10), running)
            .await
            .expect("host did not stop")
            .unwrap()
            .unwrap();
        assert_eq!(outcome, Outcome::Stopped(ShutdownReason::Graceful));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_generated_registration_feeds_next_start() {
        let dir = tempdir().unwrap();

        let root = CompositionRoot::assemble(&cli(dir.path(), &["--generate-yaml"])).unwrap();
        let Outcome::RegistrationGenerated(path) = root.execute().await.unwrap() else {
            panic!("expected registration to be generated");
        };
        let registration: Registration =
            serde_yaml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();

        let root = CompositionRoot::assemble(&cli(dir.path(), &[])).unwrap();
        let settings = root.settings();
        assert_eq!(
            settings.matrix.access_token.as_deref(),
            Some(registration.as_token.as_str())
        );
        assert_eq!(
            settings.matrix.authorization_token.as_deref(),
            Some(registration.hs_token.as_str())
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_command_line_wins_over_every_other_source() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("appsettings.json"),
            r#"{ "matrix": { "access_token": "json", "listen_port": 9100 },
                 "hades": { "server": "json.example.org" } }"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("hades-registration.yaml"),
            "id: hades\nurl: http://localhost:9000\nas_token: registration\nhs_token: registration-hs\nsender_localpart: hadesbot\n",
        )
        .unwrap();

        let root = CompositionRoot::assemble(&cli(
            dir.path(),
            &["--access-token", "cli", "--hades-server", "cli.example.org"],
        ))
        .unwrap();
        let settings = root.settings();

        assert!(root.settings_file().is_some());
        assert_eq!(settings.matrix.access_token.as_deref(), Some("cli"));
        assert_eq!(
            settings.matrix.authorization_token.as_deref(),
            Some("registration-hs")
        );
        assert_eq!(settings.matrix.listen_port, 9100);
        assert_eq!(settings.hades.server.as_deref(), Some("cli.example.org"));
    }
}
