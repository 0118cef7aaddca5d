/*

Tamarack simulates congestion-aware forwarding and adaptive content
retrieval in a named-data network. Consumers request numbered content
objects by name; forwarding nodes route each request (interest) toward
producers over one of several candidate paths; congestion surfaces either
implicitly as timeouts or explicitly as negative acknowledgements (NACKs).

# Congestion-aware multipath forwarding

Every FIB route holds an indexed list of path candidates, each with its own
congestion window (cwnd). An incoming interest is routed to exactly one
candidate, chosen at random with probability proportional to its share of
the summed windows:

  p(path) = cwnd(path) / Σ cwnd

A path that delivers data earns one window unit; a path that fails an
attempt, times out, or NACKs loses one. Windows never fall below one, so
every path keeps a nonzero probability of being probed again and can
recover once congestion clears.

NACK handling waits for the full verdict before giving up: a NACK from one
path is swallowed while any sibling path attempted for the same pending
interest is still awaiting a genuine answer. Only when every attempted path
has answered in vain does the node drop its pending entry and issue a
give-up NACK to each requester. This prevents one congested path from
failing a request that multipath forwarding could still satisfy.

# Adaptive consumer flow control

A consumer issues a single logical stream of numbered interests under one
prefix, either sequentially or by sampling a Zipf-Mandelbrot popularity
distribution over a fixed catalog. Pacing is pluggable along a single axis,
"when is the next send allowed": window policies gate on the number of
requests in flight (fixed or AIMD windows), the rate policy spaces sends at
a fixed frequency.

Outstanding requests live in a tracker ordered by send time; a periodic
sweep retires everything older than the current retransmission timeout,
which a mean-deviation RTT estimator derives from reply latencies. Replies
to retransmitted interests never feed the estimator. NACKed and timed-out
sequences go onto a retransmit queue that is drained, smallest first,
before any new sequence number is issued.

# Simulation model

Execution is single-threaded and discrete-event: a priority queue orders
events by (time, insertion sequence), handlers run to completion, and all
randomness flows from per-node generators seeded off one master seed, so a
scenario replays identically for a given seed. Nodes exchange packets over
fixed-delay point-to-point links; consumers and producers sit behind a
reserved per-node application face and traverse their own node's forwarding
layer like any other neighbor.

*/

pub mod consumer;
pub mod fwd;
mod name;
mod packet;
mod producer;
pub mod rto;
pub mod sim;

pub use name::Name;
pub use packet::{Data, Interest, NackCode, Packet};
pub use producer::Producer;
pub use sim::{FaceId, NodeId, Sim, APP_FACE};
