//! Error taxonomy for `p2p_net`: `IOError`, distinguishing listener-fatal failures
//! from per-peer ones.

error_chain::error_chain! {
    foreign_links {
        Io(std::io::Error) #[doc = "Socket bind/connect/accept failure."];
    }
}
