//! Behaviour every [`Backend`] must show, run against each driver's tests.
//!
//! Each check starts from and leaves behind an empty store.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use cask_types::{BlobType, Identifier, ID_SIZE};
use rand::{Rng, RngCore};
use tracing_subscriber::EnvFilter;

use crate::error::StoreError;
use crate::handle::CreateOutcome;
use crate::traits::{Backend, MIN_PREFIX_LENGTH};

/// Content with known SHA-256 identifiers.
pub const KNOWN_VECTORS: &[(&str, &[u8])] = &[
    (
        "c3ab8ff13720e8ad9047dd39466b3c8974e592c2fa383d4a3960714caef0c4f2",
        b"foobar",
    ),
    (
        "248d6a61d20638b8e5c026930c3e6039a33ce45964ff2167f6ecedd419db06c1",
        b"abcdbcdecdefdefgefghfghighijhijkijkljklmklmnlmnomnopnopq",
    ),
    (
        "cc5d46bdb4991c6eae3eb739c9c8a7a46fe9654fab79c47b4fe48383b5b25e1c",
        b"foo/bar",
    ),
    (
        "4e54d2c721cbdb730f01b10b62dec622962b36966ec685880effa63d71c808f2",
        b"foo/../../baz",
    ),
];

/// Route `tracing` output through the test harness. Set `RUST_LOG` to see it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn run_all<B: Backend + ?Sized>(b: &B) {
    assert_empty(b);
    test_missing(b);
    test_known_vectors(b);
    test_dedup(b);
    test_streaming(b);
    test_namespaces(b);
    test_remove_and_recreate(b);
    test_list(b);
    test_prefixes(b);
    test_verify(b);
}

pub fn test_missing<B: Backend + ?Sized>(b: &B) {
    let id = Identifier::from_content(b"never stored");
    for kind in BlobType::ALL {
        assert!(!b.test(kind, &id).unwrap(), "{kind}: phantom blob");
        assert!(b.get(kind, &id).unwrap_err().is_not_found());
        assert!(b.get_reader(kind, &id).err().unwrap().is_not_found());
        assert!(b.remove(kind, &id).unwrap_err().is_not_found());
        assert!(b.verify(kind, &id).unwrap_err().is_not_found());
    }
}

pub fn test_known_vectors<B: Backend + ?Sized>(b: &B) {
    for kind in BlobType::ALL {
        for (hex, data) in KNOWN_VECTORS {
            let expected: Identifier = hex.parse().unwrap();
            let outcome = b.save(kind, data).unwrap();
            assert_eq!(outcome, CreateOutcome::Created(expected), "{kind}: {hex}");

            assert!(b.test(kind, &expected).unwrap());
            assert_eq!(b.get(kind, &expected).unwrap(), *data);
            assert_eq!(read_all(b, kind, &expected), *data);
        }
        clear(b, kind);
    }
}

pub fn test_dedup<B: Backend + ?Sized>(b: &B) {
    for kind in BlobType::ALL {
        let first = b.save(kind, b"duplicate me").unwrap();
        assert!(first.is_created());

        // Same bytes through a different write pattern.
        let mut handle = b.create(kind).unwrap();
        for chunk in b"duplicate me".chunks(5) {
            handle.write_all(chunk).unwrap();
        }
        let second = handle.close().unwrap();
        assert_eq!(second, CreateOutcome::AlreadyPresent(first.id()));
        assert_eq!(handle.id().unwrap(), first.id());

        assert_eq!(b.list(kind).unwrap(), vec![first.id()]);
        assert_eq!(b.get(kind, &first.id()).unwrap(), b"duplicate me");
        clear(b, kind);
    }
}

pub fn test_streaming<B: Backend + ?Sized>(b: &B) {
    let mut rng = rand::thread_rng();
    for size in [0, 1, 4095, 4096, 4097, 300_000] {
        let mut data = vec![0u8; size];
        rng.fill_bytes(&mut data);

        let mut handle = b.create(BlobType::Data).unwrap();
        let mut rest = &data[..];
        while !rest.is_empty() {
            let n = rng.gen_range(1..=rest.len().min(70_000));
            handle.write_all(&rest[..n]).unwrap();
            rest = &rest[n..];
        }
        assert_eq!(handle.size(), size as u64);
        let id = handle.close().unwrap().id();

        assert_eq!(id, Identifier::from_content(&data), "size {size}");
        assert_eq!(read_all(b, BlobType::Data, &id), data);
        assert_eq!(b.get(BlobType::Data, &id).unwrap(), data);
    }
    clear(b, BlobType::Data);
}

pub fn test_namespaces<B: Backend + ?Sized>(b: &B) {
    let id = b.save(BlobType::Snapshot, b"only a snapshot").unwrap().id();
    for kind in BlobType::ALL {
        let present = kind == BlobType::Snapshot;
        assert_eq!(b.test(kind, &id).unwrap(), present, "{kind}");
        assert_eq!(b.list(kind).unwrap().contains(&id), present, "{kind}");
        if !present {
            assert!(b.get(kind, &id).unwrap_err().is_not_found());
        }
    }

    // The same content may live in several namespaces independently.
    let tree = b.save(BlobType::Tree, b"only a snapshot").unwrap();
    assert_eq!(tree, CreateOutcome::Created(id));
    b.remove(BlobType::Tree, &id).unwrap();
    assert!(b.test(BlobType::Snapshot, &id).unwrap());
    clear(b, BlobType::Snapshot);
}

pub fn test_remove_and_recreate<B: Backend + ?Sized>(b: &B) {
    for kind in BlobType::ALL {
        let id = b.save(kind, b"short-lived").unwrap().id();
        b.remove(kind, &id).unwrap();
        assert!(!b.test(kind, &id).unwrap());
        assert!(b.get(kind, &id).unwrap_err().is_not_found());

        let again = b.save(kind, b"short-lived").unwrap();
        assert_eq!(again, CreateOutcome::Created(id));
        clear(b, kind);
    }
}

pub fn test_list<B: Backend + ?Sized>(b: &B) {
    let mut rng = rand::thread_rng();
    for kind in BlobType::ALL {
        let mut expected = Vec::new();
        for _ in 0..20 {
            let mut data = vec![0u8; rng.gen_range(1..256)];
            rng.fill_bytes(&mut data);
            expected.push(b.save(kind, &data).unwrap().id());
        }
        expected.sort();
        expected.dedup();

        let listed = b.list(kind).unwrap();
        assert_eq!(listed, expected, "{kind}");
        assert!(listed.windows(2).all(|w| w[0] < w[1]));
        clear(b, kind);
        assert!(b.list(kind).unwrap().is_empty());
    }
}

pub fn test_prefixes<B: Backend + ?Sized>(b: &B) {
    let kind = BlobType::Key;
    assert_eq!(b.prefix_length(kind).unwrap(), MIN_PREFIX_LENGTH);

    let ids: Vec<Identifier> = (0u32..40)
        .map(|i| b.save(kind, &i.to_le_bytes()).unwrap().id())
        .collect();

    for id in &ids {
        assert_eq!(b.find(kind, &id.to_hex()[..MIN_PREFIX_LENGTH]).unwrap(), *id);
        assert_eq!(b.find(kind, &id.to_hex().to_uppercase()).unwrap(), *id);
    }

    let absent = Identifier::from_content(b"absent").to_hex();
    assert!(matches!(
        b.find(kind, &absent),
        Err(StoreError::NoPrefixMatch { .. })
    ));

    // 40 ids over 16 leading digits: some digit is shared.
    let mut by_first: BTreeMap<char, usize> = BTreeMap::new();
    for id in &ids {
        let first = id.to_hex().chars().next().unwrap();
        *by_first.entry(first).or_default() += 1;
    }
    let (digit, count) = by_first
        .into_iter()
        .find(|(_, count)| *count > 1)
        .unwrap();
    match b.find(kind, &digit.to_string()) {
        Err(StoreError::AmbiguousPrefix { count: got, .. }) => assert_eq!(got, count),
        other => panic!("expected ambiguous prefix, got {other:?}"),
    }

    let len = b.prefix_length(kind).unwrap();
    assert!((MIN_PREFIX_LENGTH..=ID_SIZE * 2).contains(&len));
    assert!(prefixes_unique(&ids, len));
    if len > MIN_PREFIX_LENGTH {
        assert!(!prefixes_unique(&ids, len - 1));
    }
    clear(b, kind);
}

pub fn test_verify<B: Backend + ?Sized>(b: &B) {
    for kind in BlobType::ALL {
        let id = b.save(kind, b"check me").unwrap().id();
        b.verify(kind, &id).unwrap();
        clear(b, kind);
    }
}

fn read_all<B: Backend + ?Sized>(b: &B, kind: BlobType, id: &Identifier) -> Vec<u8> {
    let mut buf = Vec::new();
    b.get_reader(kind, id)
        .unwrap()
        .read_to_end(&mut buf)
        .unwrap();
    buf
}

fn prefixes_unique(ids: &[Identifier], len: usize) -> bool {
    let mut prefixes: Vec<String> = ids.iter().map(|id| id.to_hex()[..len].to_string()).collect();
    prefixes.sort();
    prefixes.windows(2).all(|w| w[0] != w[1])
}

fn clear<B: Backend + ?Sized>(b: &B, kind: BlobType) {
    for id in b.list(kind).unwrap() {
        b.remove(kind, &id).unwrap();
    }
}

fn assert_empty<B: Backend + ?Sized>(b: &B) {
    for kind in BlobType::ALL {
        assert!(b.list(kind).unwrap().is_empty(), "{kind} not empty");
    }
}
