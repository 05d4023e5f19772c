// tests/test_listing.rs
//
// Listing engine behaviour through the public client: caps, recursion,
// ordering, pagination and partial results.

mod common;

use anyhow::Result;
use bucketwalk::{EntryKind, ListOptions, StoreError};
use common::{client_for, names, nested_bucket, small_bucket};
use futures::StreamExt;

#[tokio::test]
async fn test_recursive_cap_returns_first_two_and_stops() -> Result<()> {
    let store = small_bucket();
    let client = client_for(store.clone());

    let items = client
        .list("s3://bkt", ListOptions::new().recursive(true).max_files(2))
        .await?;

    assert_eq!(names(&items), vec!["a/1.txt", "a/2.txt"]);
    // root page + one page of "a/"; "b/" is never opened
    assert_eq!(store.list_objects_calls(), 2);
    println!("✅ max_files=2 stopped after {} backend calls", store.list_objects_calls());
    Ok(())
}

#[tokio::test]
async fn test_cap_bounds_every_shape() -> Result<()> {
    for cap in 1..=7u64 {
        for recursive in [false, true] {
            let client = client_for(nested_bucket());
            let items = client
                .list("s3://data", ListOptions::new().recursive(recursive).max_files(cap))
                .await?;
            assert!(
                items.len() as u64 <= cap,
                "cap {} recursive {} gave {} items",
                cap,
                recursive,
                items.len()
            );
        }
    }
    println!("✅ emitted length never exceeds max_files");
    Ok(())
}

#[tokio::test]
async fn test_non_recursive_lists_immediate_levels() -> Result<()> {
    let client = client_for(nested_bucket());

    let root = client.list("s3://data", ListOptions::new()).await?;
    assert_eq!(names(&root), vec!["2024/", "2025/", "logs/", "readme.md"]);
    let kinds: Vec<EntryKind> = root.iter().map(|i| i.as_object().unwrap().kind).collect();
    assert_eq!(
        kinds,
        vec![
            EntryKind::CommonPrefix,
            EntryKind::CommonPrefix,
            EntryKind::CommonPrefix,
            EntryKind::Object
        ]
    );

    // Prefix without trailing slash is treated as a directory
    let year = client.list("s3://data/2024", ListOptions::new()).await?;
    assert_eq!(names(&year), vec!["2024/feb/", "2024/jan/"]);
    println!("✅ non-recursive listing stays on one level");
    Ok(())
}

#[tokio::test]
async fn test_recursive_yields_all_leaves_in_key_order() -> Result<()> {
    let client = client_for(nested_bucket());
    let items = client.list("s3://data", ListOptions::new().recursive(true)).await?;

    assert_eq!(
        names(&items),
        vec![
            "2024/feb/x",
            "2024/jan/x",
            "2024/jan/y.csv",
            "2025/x",
            "logs/empty.log",
            "readme.md"
        ]
    );
    assert!(items
        .iter()
        .all(|i| i.as_object().is_some_and(|o| o.kind == EntryKind::Object)));
    println!("✅ recursive listing returned {} leaves", items.len());
    Ok(())
}

#[tokio::test]
async fn test_tiny_pages_give_same_result() -> Result<()> {
    let store = nested_bucket();
    let client = bucketwalk::StorageClient::with_store(
        common::fast_config().with_page_size(1),
        store.clone(),
    );

    let items = client.list("s3://data", ListOptions::new().recursive(true)).await?;
    assert_eq!(items.len(), 6);
    assert!(store.requested_page_sizes().iter().all(|&p| p == 1));
    println!("✅ {} single-entry pages walked", store.list_objects_calls());
    Ok(())
}

#[tokio::test]
async fn test_missing_bucket_is_not_found() -> Result<()> {
    let client = client_for(small_bucket());
    let err = client
        .list("s3://nope", ListOptions::new())
        .await
        .expect_err("listing a missing bucket should fail");
    assert!(err.error.is_not_found());
    assert!(err.partial.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_partial_results_then_terminal_error() -> Result<()> {
    let store = nested_bucket();
    let client = client_for(store.clone());

    let mut stream = client.list_stream("s3://data", ListOptions::new().recursive(true))?;

    // root page, then "2024/", then "2024/feb/" gives the first object
    let first = stream.next().await.expect("one item")?;
    assert_eq!(first.name(), "2024/feb/x");

    store.fail_next_list_with(StoreError::AccessDenied("policy changed".into()));
    let mut tail = Vec::new();
    while let Some(item) = stream.next().await {
        tail.push(item);
    }

    assert_eq!(tail.len(), 1, "the failure ends the stream");
    match &tail[0] {
        Err(StoreError::AccessDenied(_)) => {}
        other => panic!("expected AccessDenied, got {:?}", other),
    }
    println!("✅ prefix of results kept, then one terminal error");
    Ok(())
}

#[tokio::test]
async fn test_collected_list_keeps_entries_before_failure() -> Result<()> {
    let store = nested_bucket();
    let client = client_for(store.clone());

    // root, "2024/", "2024/feb/" succeed; "2024/jan/" is refused
    store.fail_list_call_at(4, StoreError::AccessDenied("policy changed".into()));

    let err = client
        .list("s3://data", ListOptions::new().recursive(true))
        .await
        .expect_err("fourth page is refused");

    assert_eq!(err.error.kind(), "access_denied");
    assert_eq!(names(&err.partial), vec!["2024/feb/x"]);
    assert_eq!(store.list_objects_calls(), 4);
    println!("✅ {} entry kept alongside the error", err.partial.len());
    Ok(())
}

#[tokio::test]
async fn test_stream_is_lazy() -> Result<()> {
    let store = small_bucket();
    let client = client_for(store.clone());

    let stream = client.list_stream("s3://bkt", ListOptions::new().recursive(true))?;
    assert_eq!(store.list_objects_calls(), 0);
    drop(stream);
    assert_eq!(store.list_objects_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_bucket_enumeration_in_backend_order() -> Result<()> {
    let store = std::sync::Arc::new(
        bucketwalk::MemoryStore::new()
            .with_bucket("alpha")
            .with_bucket("beta"),
    );
    let client = client_for(store.clone());

    let buckets = client.list_buckets("s3://").await?;
    let bucket_names: Vec<_> = buckets.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(bucket_names, vec!["alpha", "beta"]);

    // Same thing through list() with an empty bucket, filters ignored
    let items = client
        .list(
            "s3://",
            ListOptions::new().filter(bucketwalk::FilterSpec::new().with_name("zzz")),
        )
        .await?;
    assert_eq!(names(&items), vec!["alpha", "beta"]);
    assert_eq!(store.list_objects_calls(), 0);
    println!("✅ buckets listed in order");
    Ok(())
}
