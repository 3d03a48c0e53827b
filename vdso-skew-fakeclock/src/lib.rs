//! Embeds the relocatable fake-image objects produced by `build.rs`.
//!
//! These bytes are the "input artifacts" spec.md §1 treats as external
//! collaborators: the Fake-Image Loader only ever sees them as a `&[u8]`,
//! same as it would see bytes read from `fake_clock_gettime_<arch>.o` on
//! disk.

/// Raw ET_REL bytes for the `clock_gettime` replacement, built for the
/// crate's target architecture.
pub static FAKE_CLOCK_GETTIME_OBJ: &[u8] =
    include_bytes!(concat!(env!("OUT_DIR"), "/fake_clock_gettime_", env!("FAKE_IMAGE_ARCH"), ".o"));

/// Raw ET_REL bytes for the `gettimeofday` replacement, built for the
/// crate's target architecture.
pub static FAKE_GETTIMEOFDAY_OBJ: &[u8] =
    include_bytes!(concat!(env!("OUT_DIR"), "/fake_gettimeofday_", env!("FAKE_IMAGE_ARCH"), ".o"));
