mod common;

use common::{BUCKET, Harness, full_access, key};
use vault_core::{ObjectStore, Operation, StaticPermissions, Tags};
use vault_files::{
    ASSET_ID_TAG, CascadeAction, CopyFileRequest, DATABASE_ID_TAG, FileError, MoveFileRequest,
};

fn copy(src: &str, dst: &str, dest_asset: Option<&str>) -> CopyFileRequest {
    CopyFileRequest {
        source_path: src.into(),
        destination_path: dst.into(),
        destination_asset_id: dest_asset.map(String::from),
    }
}

fn mv(src: &str, dst: &str) -> MoveFileRequest {
    MoveFileRequest {
        source_path: src.into(),
        destination_path: dst.into(),
    }
}

#[tokio::test]
async fn copy_within_asset_carries_previews_and_auxiliary_files() {
    let h = Harness::new().await;
    let perms = full_access();
    h.put("a1", "/model.obj", b"m").await;
    h.put("a1", "/model.obj.previewFile.png", b"p").await;
    h.put_aux("a1", "/model.obj/thumb.png").await;

    let result = h
        .manager
        .copy_file(&perms, &h.asset("a1"), &copy("/model.obj", "/chair.obj", None))
        .await
        .unwrap();
    assert_eq!(
        result.affected_files,
        vec![
            "/chair.obj".to_string(),
            "/chair.obj.previewFile.png".to_string(),
            "/chair.obj/thumb.png".to_string(),
        ]
    );
    assert_eq!(h.body("a1", "/chair.obj").await.as_ref(), b"m");
    assert!(h.is_live("a1", "/model.obj").await);
    assert!(h.is_live("a1", "/chair.obj.previewFile.png").await);
    assert!(h.aux_exists("a1", "/chair.obj/thumb.png").await);
    assert!(h.aux_exists("a1", "/model.obj/thumb.png").await);
}

#[tokio::test]
async fn copy_onto_an_existing_file_changes_nothing() {
    let h = Harness::new().await;
    let perms = full_access();
    h.put("a1", "/model.obj", b"src").await;
    h.put("a1", "/chair.obj", b"dst").await;

    let err = h
        .manager
        .copy_file(&perms, &h.asset("a1"), &copy("/model.obj", "/chair.obj", None))
        .await
        .unwrap_err();
    assert!(matches!(err, FileError::General(msg) if msg == "Destination file already exists."));
    assert_eq!(h.body("a1", "/chair.obj").await.as_ref(), b"dst");
    assert_eq!(h.chain_len("a1", "/chair.obj").await, 1);
}

#[tokio::test]
async fn copy_of_a_missing_or_preview_file_fails() {
    let h = Harness::new().await;
    let perms = full_access();
    h.put("a1", "/model.obj.previewFile.png", b"p").await;

    let missing = h
        .manager
        .copy_file(&perms, &h.asset("a1"), &copy("/nope.obj", "/b.obj", None))
        .await;
    assert!(matches!(missing, Err(FileError::General(msg)) if msg == "Source file not found."));

    let preview = h
        .manager
        .copy_file(
            &perms,
            &h.asset("a1"),
            &copy("/model.obj.previewFile.png", "/x.png", None),
        )
        .await;
    assert!(matches!(preview, Err(FileError::General(msg)) if msg.contains("preview")));
}

#[tokio::test]
async fn cross_asset_copy_retargets_identity_tags() {
    let h = Harness::new().await;
    let perms = full_access();
    let mut tags = Tags::new();
    tags.insert(ASSET_ID_TAG.into(), "a1".into());
    tags.insert(DATABASE_ID_TAG.into(), common::DB.into());
    tags.insert("owner".into(), "team-a".into());
    h.put_tagged("a1", "/model.obj", b"m", tags).await;

    let result = h
        .manager
        .copy_file(&perms, &h.asset("a1"), &copy("/model.obj", "/model.obj", Some("a2")))
        .await
        .unwrap();
    assert!(result.message.contains("in asset a2"));

    let head = h.content.head(BUCKET, &key("a2", "/model.obj")).await.unwrap();
    assert_eq!(head.tags.get(ASSET_ID_TAG).map(String::as_str), Some("a2"));
    assert_eq!(head.tags.get("owner").map(String::as_str), Some("team-a"));
    assert!(h.is_live("a1", "/model.obj").await);
    assert_eq!(
        h.notifier.events(),
        vec![(common::DB.to_string(), "a2".to_string())]
    );
}

#[tokio::test]
async fn cross_asset_copy_without_destination_access_creates_nothing() {
    let h = Harness::new().await;
    h.put("a1", "/model.obj", b"m").await;
    let perms = StaticPermissions::new()
        .allow_all_on(common::DB, "a1")
        .allow(common::DB, "a2", Operation::Read);

    let err = h
        .manager
        .copy_file(&perms, &h.asset("a1"), &copy("/model.obj", "/model.obj", Some("a2")))
        .await
        .unwrap_err();
    assert!(matches!(err, FileError::Unauthorized(_)));
    assert_eq!(h.chain_len("a2", "/model.obj").await, 0);
    assert!(h.notifier.events().is_empty());
}

#[tokio::test]
async fn copy_into_an_asset_of_another_database_is_not_found() {
    let h = Harness::new().await;
    h.put("a1", "/model.obj", b"m").await;

    // destination lookups stay within the source database
    let err = h
        .manager
        .copy_file(
            &full_access(),
            &h.asset("a1"),
            &copy("/model.obj", "/model.obj", Some("x1")),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FileError::General(msg) if msg.starts_with("Asset not found")));
    assert_eq!(h.chain_len("x1", "/model.obj").await, 0);
}

#[tokio::test]
async fn move_archives_the_source_and_moves_previews() {
    let h = Harness::new().await;
    let perms = full_access();
    h.put("a1", "/model.obj", b"m").await;
    h.put("a1", "/model.obj.previewFile.png", b"p").await;
    h.put_aux("a1", "/model.obj/thumb.png").await;

    let result = h
        .manager
        .move_file(&perms, &h.asset("a1"), &mv("/model.obj", "/dir/chair.obj"))
        .await
        .unwrap();
    assert_eq!(&result.affected_files[..2], ["/model.obj", "/dir/chair.obj"]);
    assert_eq!(result.cascades.count(CascadeAction::MovePreview), 1);
    assert_eq!(result.cascades.count(CascadeAction::MoveAuxiliary), 1);

    assert!(!h.is_live("a1", "/model.obj").await);
    // the source keeps its history behind a tombstone
    assert_eq!(h.chain_len("a1", "/model.obj").await, 2);
    assert_eq!(h.body("a1", "/dir/chair.obj").await.as_ref(), b"m");
    assert!(!h.is_live("a1", "/model.obj.previewFile.png").await);
    assert!(h.is_live("a1", "/dir/chair.obj.previewFile.png").await);
    assert!(h.aux_exists("a1", "/dir/chair.obj/thumb.png").await);
    assert!(!h.aux_exists("a1", "/model.obj/thumb.png").await);
}

#[tokio::test]
async fn move_renames_every_preview() {
    for n in 0..=3 {
        let h = Harness::new().await;
        h.put("a1", "/model.obj", b"m").await;
        let extensions = ["png", "gif", "jpg"];
        for ext in &extensions[..n] {
            h.put("a1", &format!("/model.obj.previewFile.{ext}"), b"p").await;
        }

        let result = h
            .manager
            .move_file(&full_access(), &h.asset("a1"), &mv("/model.obj", "/chair.obj"))
            .await
            .unwrap();
        assert_eq!(result.cascades.count(CascadeAction::MovePreview), n, "n={n}");
        for ext in &extensions[..n] {
            assert!(h.is_live("a1", &format!("/chair.obj.previewFile.{ext}")).await);
            assert!(!h.is_live("a1", &format!("/model.obj.previewFile.{ext}")).await);
        }
    }
}

#[tokio::test]
async fn move_onto_an_existing_file_or_itself_fails() {
    let h = Harness::new().await;
    let perms = full_access();
    h.put("a1", "/model.obj", b"src").await;
    h.put("a1", "/chair.obj", b"dst").await;

    let exists = h
        .manager
        .move_file(&perms, &h.asset("a1"), &mv("/model.obj", "/chair.obj"))
        .await;
    assert!(matches!(exists, Err(FileError::General(msg)) if msg == "Destination file already exists."));
    assert!(h.is_live("a1", "/model.obj").await);
    assert_eq!(h.body("a1", "/chair.obj").await.as_ref(), b"dst");

    let same = h
        .manager
        .move_file(&perms, &h.asset("a1"), &mv("/model.obj", "/model.obj"))
        .await;
    assert!(matches!(same, Err(FileError::General(msg)) if msg.contains("must be different")));
}
