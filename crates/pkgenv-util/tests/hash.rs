use pkgenv_util::hash::{sha256_bytes, sha256_parts};

#[test]
fn test_sha256_bytes_empty() {
    let hash = sha256_bytes(b"");
    assert_eq!(
        hash,
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

#[test]
fn test_sha256_bytes_hello() {
    let hash = sha256_bytes(b"hello");
    assert_eq!(
        hash,
        "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    );
}

#[test]
fn test_sha256_parts_deterministic() {
    let a = sha256_parts(&["python-2.6", "boost-1.36"]);
    let b = sha256_parts(&["python-2.6", "boost-1.36"]);
    assert_eq!(a, b);
}

#[test]
fn test_sha256_parts_order_matters() {
    let a = sha256_parts(&["a", "b"]);
    let b = sha256_parts(&["b", "a"]);
    assert_ne!(a, b);
}

#[test]
fn test_sha256_parts_boundaries_matter() {
    let a = sha256_parts(&["ab", "c"]);
    let b = sha256_parts(&["a", "bc"]);
    assert_ne!(a, b);
}
