use crate::name::Name;

/// Reason carried by a negative acknowledgement.
///
/// A NACK is an interest whose `nack` field is set; the name, nonce and
/// lifetime of the original interest are preserved so the receiver can match
/// it against its own pending state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NackCode {
    /// The interest revisited a node that already has it pending.
    Loop,
    /// A downstream node refused the interest due to congestion.
    Congestion,
    /// A downstream node exhausted its forwarding options and dropped its
    /// pending-interest state.
    GiveUp,
}

#[derive(Clone, Debug)]
pub struct Interest {
    pub name: Name,
    pub nonce: u32,
    pub lifetime_us: u64,
    pub nack: Option<NackCode>,
    /// Diagnostic hop counter, incremented per link traversal.
    pub hop_count: u32,
}

impl Interest {
    pub fn new(name: Name, nonce: u32, lifetime_us: u64) -> Self {
        Self {
            name,
            nonce,
            lifetime_us,
            nack: None,
            hop_count: 0,
        }
    }

    /// Returns a copy of this interest converted into a NACK.
    pub fn as_nack(&self, code: NackCode) -> Self {
        let mut nack = self.clone();
        nack.nack = Some(code);
        nack
    }

    /// Returns a copy of this interest with the NACK flag cleared, hop count
    /// preserved.
    pub fn as_plain(&self) -> Self {
        let mut interest = self.clone();
        interest.nack = None;
        interest
    }
}

#[derive(Clone, Debug)]
pub struct Data {
    pub name: Name,
    /// Hop count copied from the satisfying interest by the producer.
    pub hop_count: u32,
}

#[derive(Clone, Debug)]
pub enum Packet {
    Interest(Interest),
    Data(Data),
}
