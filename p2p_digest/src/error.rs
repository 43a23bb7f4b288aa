//! Error taxonomy for `p2p_digest`.

error_chain::error_chain! {
    foreign_links {
        Io(std::io::Error) #[doc = "Filesystem read/open failure."];
    }

    errors {
        /// Passed to `hash_file`/`find_by_hash` style operations with a hash string
        /// that does not pass `is_valid_hash`.
        InvalidHash(given: String) {
            description("not a valid 64-character hex sha256 hash")
            display("invalid hash: '{}'", given)
        }
    }
}
