//! Telnet plumbing shared by the Hades session and the local relay.
pub mod relay;

pub use relay::TelnetRelay;

const IAC: u8 = 255;
const DONT: u8 = 254;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum FilterState {
    #[default]
    Data,
    Iac,
    Negotiation,
    Subnegotiation,
    SubnegotiationIac,
}

/// Removes telnet command sequences (IAC ...) from a byte stream.
///
/// Stateful, so a sequence split across two reads is still removed.
#[derive(Debug, Default)]
pub struct TelnetFilter {
    state: FilterState,
}

impl TelnetFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(&mut self, input: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(input.len());
        for &byte in input {
            self.state = match self.state {
                FilterState::Data if byte == IAC => FilterState::Iac,
                FilterState::Data => {
                    out.push(byte);
                    FilterState::Data
                }
                FilterState::Iac => match byte {
                    IAC => {
                        out.push(IAC);
                        FilterState::Data
                    }
                    SB => FilterState::Subnegotiation,
                    WILL..=DONT => FilterState::Negotiation,
                    _ => FilterState::Data,
                },
                FilterState::Negotiation => FilterState::Data,
                FilterState::Subnegotiation if byte == IAC => FilterState::SubnegotiationIac,
                FilterState::Subnegotiation => FilterState::Subnegotiation,
                FilterState::SubnegotiationIac if byte == SE => FilterState::Data,
                FilterState::SubnegotiationIac => FilterState::Subnegotiation,
            };
        }
        out
    }
}
