use log::debug;

use crate::name::Name;
use crate::packet::{Data, Interest};

/// Answers every interest under its prefix with a same-name data packet,
/// carrying the interest's hop count back for diagnostics.
pub struct Producer {
    prefix: Name,
    served: u64,
}

impl Producer {
    pub fn new(prefix: Name) -> Self {
        Self { prefix, served: 0 }
    }

    pub fn prefix(&self) -> &Name {
        &self.prefix
    }

    /// Number of interests answered.
    pub fn served(&self) -> u64 {
        self.served
    }

    pub fn handle_interest(&mut self, interest: &Interest) -> Option<Data> {
        if !interest.name.has_prefix(&self.prefix) {
            debug!("interest {} outside prefix {}", interest.name, self.prefix);
            return None;
        }

        self.served += 1;

        Some(Data {
            name: interest.name.clone(),
            hop_count: interest.hop_count,
        })
    }
}
