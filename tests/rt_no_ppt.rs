use std::fs;
use std::path::Path;

/// The firing path must not reach the invariant log, which takes a Mutex.
#[test]
fn rt_does_not_call_assert_invariant() {
    let src_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    for file in ["rt.rs", "actor.rs"] {
        let src = fs::read_to_string(src_dir.join(file)).expect("failed to read source");
        assert!(
            !src.contains("assert_invariant("),
            "{file}: firing paths must not call assert_invariant (acquires Mutex)"
        );
    }
}
