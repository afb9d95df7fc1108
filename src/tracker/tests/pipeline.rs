use super::*;

const POST_URL: &str = "https://www.instagram.com/p/ABC123/";

fn no_cover() -> DownloadOptions {
    DownloadOptions {
        add_cover: Some(false),
        ..DownloadOptions::default()
    }
}

#[tokio::test]
async fn single_image_gets_repost_caption_and_cover() {
    let source = Arc::new(StaticSource::new(post(
        "alice",
        "Golden hour",
        vec![image_item(1)],
    )));
    let (tracker, _dir) = create_test_tracker(source).await;

    let id = tracker.submit(POST_URL, DownloadOptions::default()).unwrap();
    let task = wait_for_terminal(&tracker, &id).await;

    assert_eq!(task.status, TaskStatus::Completed, "{:?}", task.error);
    assert_eq!(task.progress, 100);
    let result = task.result.unwrap();
    assert_eq!(result.caption, "#Repost from @alice\n\nGolden hour");
    assert_eq!(result.summary, "Successfully downloaded 1 file(s)");
    assert_eq!(result.files, vec!["01.cover.jpg", "01.jpg", "caption.txt"]);

    let caption_path = tracker.layout.root().join(&result.folder).join("caption.txt");
    assert_eq!(
        std::fs::read_to_string(caption_path).unwrap(),
        "#Repost from @alice\n\nGolden hour"
    );
}

#[tokio::test]
async fn carousel_files_are_numbered_in_source_order() {
    let items = vec![image_item(1), image_item(2), image_item(3)];
    let source = Arc::new(StaticSource::new(post("alice", "", items)));
    let (tracker, _dir) = create_test_tracker(source).await;

    let id = tracker.submit(POST_URL, DownloadOptions::default()).unwrap();
    let task = wait_for_terminal(&tracker, &id).await;
    let folder = task.result.unwrap().folder;

    assert_eq!(
        bundle_files(&tracker, &folder),
        vec![
            "01.cover.jpg",
            "01.jpg",
            "02.cover.jpg",
            "02.jpg",
            "03.cover.jpg",
            "03.jpg",
            "caption.txt"
        ]
    );
}

#[tokio::test]
async fn covers_are_produced_for_images_only() {
    let items = vec![image_item(1), video_item(2), image_item(3)];
    let source = Arc::new(StaticSource::new(post("alice", "mixed", items)));
    let (tracker, _dir) = create_test_tracker(source).await;

    let id = tracker.submit(POST_URL, DownloadOptions::default()).unwrap();
    let task = wait_for_terminal(&tracker, &id).await;
    let folder = task.result.unwrap().folder;

    assert_eq!(
        bundle_files(&tracker, &folder),
        vec!["01.cover.jpg", "01.jpg", "02.mp4", "03.cover.jpg", "03.jpg", "caption.txt"]
    );
}

#[tokio::test]
async fn cover_disabled_keeps_originals_byte_identical() {
    let items = vec![image_item(1), video_item(2)];
    let expected: Vec<Vec<u8>> = items.iter().map(|i| i.bytes.clone()).collect();
    let source = Arc::new(StaticSource::new(post("alice", "x", items)));
    let (tracker, _dir) = create_test_tracker(source).await;

    let id = tracker.submit(POST_URL, no_cover()).unwrap();
    let task = wait_for_terminal(&tracker, &id).await;
    let folder = task.result.unwrap().folder;

    let files = bundle_files(&tracker, &folder);
    assert!(files.iter().all(|f| !f.contains(".cover.")), "{files:?}");
    assert_eq!(files, vec!["01.jpg", "02.mp4", "caption.txt"]);

    let root = tracker.layout.root().join(&folder);
    assert_eq!(std::fs::read(root.join("01.jpg")).unwrap(), expected[0]);
    assert_eq!(std::fs::read(root.join("02.mp4")).unwrap(), expected[1]);
}

#[tokio::test]
async fn cover_follows_configured_default_when_request_is_silent() {
    let source = Arc::new(StaticSource::new(post("alice", "x", vec![image_item(1)])));
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&dir);
    config.cover.enabled_by_default = false;
    let tracker = TaskTracker::with_source(config, source).await.unwrap();

    let id = tracker.submit(POST_URL, DownloadOptions::default()).unwrap();
    let task = wait_for_terminal(&tracker, &id).await;
    assert_eq!(task.result.unwrap().files, vec!["01.jpg", "caption.txt"]);
}

#[tokio::test]
async fn same_reference_twice_yields_distinct_bundles() {
    let source = Arc::new(StaticSource::new(post("alice", "x", vec![image_item(1)])));
    let (tracker, _dir) = create_test_tracker(source).await;

    let first = tracker.submit(POST_URL, no_cover()).unwrap();
    let second = tracker.submit(POST_URL, no_cover()).unwrap();
    let a = wait_for_terminal(&tracker, &first).await.result.unwrap();
    let b = wait_for_terminal(&tracker, &second).await.result.unwrap();

    assert_ne!(a.folder, b.folder);
    assert_eq!(bundle_files(&tracker, &a.folder), vec!["01.jpg", "caption.txt"]);
    assert_eq!(bundle_files(&tracker, &b.folder), vec!["01.jpg", "caption.txt"]);
    assert_eq!(tracker.list_bundles().await.unwrap().len(), 2);
}

#[tokio::test]
async fn fetch_failure_fails_task_without_leaving_a_bundle() {
    let source = Arc::new(StaticSource::new(Outcome::NotFound));
    let (tracker, _dir) = create_test_tracker(source).await;

    let id = tracker.submit(POST_URL, DownloadOptions::default()).unwrap();
    let task = wait_for_terminal(&tracker, &id).await;

    assert_eq!(task.status, TaskStatus::Failed);
    let error = task.error.unwrap();
    assert!(!error.is_empty());
    assert!(error.contains("not found"), "{error}");
    assert!(task.result.is_none());
    assert!(tracker.list_bundles().await.unwrap().is_empty());

    let root = tracker.layout.root();
    let leftovers = std::fs::read_dir(root).map(|d| d.count()).unwrap_or(0);
    assert_eq!(leftovers, 0, "no directory may be left behind");
}

#[tokio::test]
async fn access_denied_is_reported_distinctly() {
    let source = Arc::new(StaticSource::new(Outcome::AccessDenied));
    let (tracker, _dir) = create_test_tracker(source).await;

    let id = tracker.submit(POST_URL, DownloadOptions::default()).unwrap();
    let task = wait_for_terminal(&tracker, &id).await;
    assert!(task.error.unwrap().contains("access denied"));
}

#[tokio::test]
async fn missing_template_fails_the_task_when_cover_is_enabled() {
    let source = Arc::new(StaticSource::new(post("alice", "x", vec![image_item(1)])));
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&dir);
    config.cover.template_path = dir.path().join("missing.png");
    let tracker = TaskTracker::with_source(config, source).await.unwrap();

    let id = tracker.submit(POST_URL, DownloadOptions::default()).unwrap();
    let task = wait_for_terminal(&tracker, &id).await;
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error.unwrap().contains("cover template not found"));
    assert!(tracker.list_bundles().await.unwrap().is_empty());

    // Same config without covers succeeds
    let id = tracker.submit(POST_URL, no_cover()).unwrap();
    let task = wait_for_terminal(&tracker, &id).await;
    assert_eq!(task.status, TaskStatus::Completed);
}

#[tokio::test]
async fn video_only_post_needs_no_template() {
    let source = Arc::new(StaticSource::new(post("alice", "clip", vec![video_item(1)])));
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&dir);
    config.cover.template_path = dir.path().join("missing.png");
    let tracker = TaskTracker::with_source(config, source).await.unwrap();

    let id = tracker.submit(POST_URL, DownloadOptions::default()).unwrap();
    let task = wait_for_terminal(&tracker, &id).await;
    assert_eq!(task.status, TaskStatus::Completed, "{:?}", task.error);
    assert_eq!(task.result.unwrap().files, vec!["01.mp4", "caption.txt"]);
}

#[tokio::test]
async fn undecodable_image_fails_the_task_when_cover_is_enabled() {
    let mut broken = image_item(1);
    broken.bytes = b"definitely not a jpeg".to_vec();
    let source = Arc::new(StaticSource::new(post("alice", "x", vec![broken])));
    let (tracker, _dir) = create_test_tracker(source).await;

    let id = tracker.submit(POST_URL, DownloadOptions::default()).unwrap();
    let task = wait_for_terminal(&tracker, &id).await;
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error.unwrap().contains("01.jpg"));
}

#[tokio::test]
async fn caption_options_are_honored() {
    let source = Arc::new(StaticSource::new(post("alice", "Original", vec![video_item(1)])));
    let (tracker, _dir) = create_test_tracker(source).await;

    let disabled = DownloadOptions {
        repost_caption: false,
        ..no_cover()
    };
    let templated = DownloadOptions {
        caption_template: Some("📸 @username\n".into()),
        ..no_cover()
    };

    let a = tracker.submit(POST_URL, disabled).unwrap();
    let b = tracker.submit(POST_URL, templated).unwrap();

    let a = wait_for_terminal(&tracker, &a).await.result.unwrap();
    let b = wait_for_terminal(&tracker, &b).await.result.unwrap();
    assert_eq!(a.caption, "Original");
    assert_eq!(b.caption, "📸 @alice\nOriginal");
}

#[tokio::test]
async fn profile_reference_downloads_with_empty_original_caption() {
    let source = Arc::new(StaticSource::new(post("alice", "", vec![image_item(1), image_item(2)])));
    let (tracker, _dir) = create_test_tracker(source).await;

    let id = tracker.submit("@alice", no_cover()).unwrap();
    let task = wait_for_terminal(&tracker, &id).await;
    let result = task.result.unwrap();
    assert_eq!(result.caption, "#Repost from @alice");
    assert!(result.folder.contains("_alice_"));
}
