//! Pipeline integration tests against mocked storage and notifier.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use drive_merge_core::config::RunOptions;
use drive_merge_core::contract::{
    CreatedFile, FileMetadata, MockNotifier, MockStorage, NotifyError, RemoteFile, StorageError,
    FOLDER_MIME, PDF_MIME,
};
use drive_merge_core::merge::page_count;
use drive_merge_core::pipeline::{self, PipelineError};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use mockall::predicate::eq;

const FOLDER: &str = "folder-1";
const MERGED_ID: &str = "merged-file-id";
const MERGED_URL: &str = "https://drive.example/view/merged-file-id";

/// Build a small PDF whose pages each carry a recognizable text label.
fn sample_pdf(label: &str, pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let mut kids: Vec<Object> = Vec::new();
    for number in 1..=pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!("{label}-{number}"))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut out = Vec::new();
    doc.save_to(&mut out).expect("serialize sample pdf");
    out
}

fn page_texts(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).expect("parse merged pdf");
    let mut texts = Vec::new();
    for number in doc.get_pages().keys() {
        let text = doc.extract_text(&[*number]).expect("extract page text");
        texts.push(text.trim().to_string());
    }
    texts
}

fn remote(id: &str, name: &str, created: &str) -> RemoteFile {
    RemoteFile {
        id: id.to_string(),
        name: name.to_string(),
        size: None,
        created_time: created.to_string(),
    }
}

fn expect_valid_folder(storage: &mut MockStorage) {
    storage
        .expect_get_metadata()
        .with(eq(FOLDER))
        .returning(|id| {
            Ok(FileMetadata {
                id: id.to_string(),
                mime_type: FOLDER_MIME.to_string(),
                trashed: false,
            })
        });
}

fn expect_upload_capturing(storage: &mut MockStorage, captured: Arc<Mutex<Option<Vec<u8>>>>) {
    storage
        .expect_upload()
        .withf(|parent, name, _| parent == FOLDER && name.ends_with(".pdf"))
        .returning(move |_, _, content| {
            *captured.lock().unwrap() = Some(content);
            Ok(CreatedFile {
                id: MERGED_ID.to_string(),
                web_view_link: Some(MERGED_URL.to_string()),
            })
        });
}

#[tokio::test]
async fn merges_chunks_in_order_and_publishes() {
    let mut storage = MockStorage::new();
    expect_valid_folder(&mut storage);

    // Listed deliberately out of merge order.
    storage
        .expect_list_files()
        .with(eq(FOLDER), eq(PDF_MIME))
        .times(1)
        .returning(|_, _| {
            Ok(vec![
                remote("id-other", "other.pdf", "2024-01-01T00:00:00Z"),
                remote("id-c2", "chunk_2_x.pdf", "2024-01-01T00:00:00Z"),
                remote("id-c1", "chunk_1_y.pdf", "2024-06-01T00:00:00Z"),
            ])
        });

    let c1 = sample_pdf("c1", 2);
    let c2 = sample_pdf("c2", 3);
    let other = sample_pdf("other", 1);
    storage.expect_download().returning(move |id| match id {
        "id-c1" => Ok(c1.clone()),
        "id-c2" => Ok(c2.clone()),
        "id-other" => Ok(other.clone()),
        _ => Err(StorageError::NotFound(id.to_string())),
    });

    let uploaded = Arc::new(Mutex::new(None));
    expect_upload_capturing(&mut storage, uploaded.clone());

    let options = RunOptions::new(FOLDER);
    let result = pipeline::run(&storage, None::<&MockNotifier>, &options)
        .await
        .expect("pipeline should succeed");

    assert_eq!(result.file_id.as_deref(), Some(MERGED_ID));
    assert_eq!(result.url.as_deref(), Some(MERGED_URL));

    let merged = uploaded.lock().unwrap().take().expect("upload captured");
    assert_eq!(page_count(&merged).unwrap(), 6);
    assert_eq!(
        page_texts(&merged),
        vec!["c1-1", "c1-2", "c2-1", "c2-2", "c2-3", "other-1"]
    );
}

#[tokio::test]
async fn single_file_round_trips_through_the_pipeline() {
    let mut storage = MockStorage::new();
    expect_valid_folder(&mut storage);
    storage
        .expect_list_files()
        .times(1)
        .returning(|_, _| Ok(vec![remote("id-solo", "chunk_1_a.pdf", "t")]));

    let input = sample_pdf("solo", 3);
    let expected_texts = page_texts(&input);
    storage
        .expect_download()
        .with(eq("id-solo"))
        .returning(move |_| Ok(input.clone()));

    let uploaded = Arc::new(Mutex::new(None));
    expect_upload_capturing(&mut storage, uploaded.clone());

    let options = RunOptions::new(FOLDER);
    pipeline::run(&storage, None::<&MockNotifier>, &options)
        .await
        .expect("pipeline should succeed");

    let merged = uploaded.lock().unwrap().take().expect("upload captured");
    assert_eq!(page_count(&merged).unwrap(), 3);
    assert_eq!(page_texts(&merged), expected_texts);
}

#[tokio::test]
async fn empty_folder_aborts_before_any_download() {
    let mut storage = MockStorage::new();
    expect_valid_folder(&mut storage);
    storage.expect_list_files().returning(|_, _| Ok(vec![]));
    // No download/upload expectations: any such call would panic the mock.

    let options = RunOptions::new(FOLDER);
    let err = pipeline::run(&storage, None::<&MockNotifier>, &options)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::EmptyFolder(_)));
}

#[tokio::test]
async fn trashed_or_wrong_type_folder_fails_verification() {
    let mut storage = MockStorage::new();
    storage.expect_get_metadata().returning(|id| {
        Ok(FileMetadata {
            id: id.to_string(),
            mime_type: FOLDER_MIME.to_string(),
            trashed: true,
        })
    });
    let err = pipeline::run(&storage, None::<&MockNotifier>, &RunOptions::new(FOLDER))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Folder(_)));

    let mut storage = MockStorage::new();
    storage.expect_get_metadata().returning(|id| {
        Ok(FileMetadata {
            id: id.to_string(),
            mime_type: PDF_MIME.to_string(),
            trashed: false,
        })
    });
    let err = pipeline::run(&storage, None::<&MockNotifier>, &RunOptions::new(FOLDER))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Folder(_)));

    let mut storage = MockStorage::new();
    storage
        .expect_get_metadata()
        .returning(|id| Err(StorageError::NotFound(id.to_string())));
    let err = pipeline::run(&storage, None::<&MockNotifier>, &RunOptions::new(FOLDER))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Folder(_)));
}

#[tokio::test]
async fn clean_deletes_everything_except_the_published_file() {
    let mut storage = MockStorage::new();
    expect_valid_folder(&mut storage);

    let chunks = vec![
        remote("id-c1", "chunk_1_a.pdf", "t"),
        remote("id-c2", "chunk_2_b.pdf", "t"),
    ];
    let mut after_upload = chunks.clone();
    after_upload.push(remote(MERGED_ID, "merged_20240101_000000.pdf", "t"));

    let call = AtomicUsize::new(0);
    storage
        .expect_list_files()
        .times(2)
        .returning(move |_, _| {
            if call.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(chunks.clone())
            } else {
                Ok(after_upload.clone())
            }
        });

    let pdf = sample_pdf("x", 1);
    storage
        .expect_download()
        .returning(move |_| Ok(pdf.clone()));
    expect_upload_capturing(&mut storage, Arc::new(Mutex::new(None)));

    // The published file must never be deleted.
    storage
        .expect_delete()
        .withf(|id| id != MERGED_ID && id != FOLDER)
        .times(2)
        .returning(|_| Ok(()));

    let mut options = RunOptions::new(FOLDER);
    options.clean_chunks = true;
    pipeline::run(&storage, None::<&MockNotifier>, &options)
        .await
        .expect("pipeline should succeed");
}

#[tokio::test]
async fn delete_folder_runs_only_with_clean_chunks() {
    let mut storage = MockStorage::new();
    expect_valid_folder(&mut storage);
    storage
        .expect_list_files()
        .times(2)
        .returning(|_, _| Ok(vec![remote("id-c1", "chunk_1_a.pdf", "t")]));
    let pdf = sample_pdf("x", 1);
    storage
        .expect_download()
        .returning(move |_| Ok(pdf.clone()));
    expect_upload_capturing(&mut storage, Arc::new(Mutex::new(None)));

    // One delete for the chunk, one for the folder itself.
    storage
        .expect_delete()
        .with(eq("id-c1"))
        .times(1)
        .returning(|_| Ok(()));
    storage
        .expect_delete()
        .with(eq(FOLDER))
        .times(1)
        .returning(|_| Ok(()));

    let mut options = RunOptions::new(FOLDER);
    options.clean_chunks = true;
    options.delete_folder = true;
    pipeline::run(&storage, None::<&MockNotifier>, &options)
        .await
        .expect("pipeline should succeed");
}

#[tokio::test]
async fn delete_folder_without_clean_is_ignored() {
    let mut storage = MockStorage::new();
    expect_valid_folder(&mut storage);
    storage
        .expect_list_files()
        .times(1)
        .returning(|_, _| Ok(vec![remote("id-c1", "chunk_1_a.pdf", "t")]));
    let pdf = sample_pdf("x", 1);
    storage
        .expect_download()
        .returning(move |_| Ok(pdf.clone()));
    expect_upload_capturing(&mut storage, Arc::new(Mutex::new(None)));
    // No delete expectation: deleting anything would panic the mock.

    let mut options = RunOptions::new(FOLDER);
    options.delete_folder = true;
    pipeline::run(&storage, None::<&MockNotifier>, &options)
        .await
        .expect("pipeline should succeed");
}

#[tokio::test]
async fn move_destination_lookup_miss_skips_the_move() {
    let mut storage = MockStorage::new();
    expect_valid_folder(&mut storage);
    storage
        .expect_list_files()
        .times(1)
        .returning(|_, _| Ok(vec![remote("id-c1", "chunk_1_a.pdf", "t")]));
    let pdf = sample_pdf("x", 1);
    storage
        .expect_download()
        .returning(move |_| Ok(pdf.clone()));
    expect_upload_capturing(&mut storage, Arc::new(Mutex::new(None)));
    storage.expect_find_folder().returning(|_| Ok(None));
    // No move_file expectation: an attempted move would panic the mock.

    let mut options = RunOptions::new(FOLDER);
    options.move_to_root = true;
    let result = pipeline::run(&storage, None::<&MockNotifier>, &options)
        .await
        .expect("lookup miss must not fail the run");
    assert_eq!(result.file_id.as_deref(), Some(MERGED_ID));
}

#[tokio::test]
async fn move_relocates_the_published_file() {
    let mut storage = MockStorage::new();
    expect_valid_folder(&mut storage);
    storage
        .expect_list_files()
        .times(1)
        .returning(|_, _| Ok(vec![remote("id-c1", "chunk_1_a.pdf", "t")]));
    let pdf = sample_pdf("x", 1);
    storage
        .expect_download()
        .returning(move |_| Ok(pdf.clone()));
    expect_upload_capturing(&mut storage, Arc::new(Mutex::new(None)));

    storage
        .expect_find_folder()
        .with(eq("Rememly"))
        .returning(|_| Ok(Some("root-id".to_string())));
    storage
        .expect_find_child_folder()
        .with(eq("root-id"), eq("pdf"))
        .returning(|_, _| Ok(Some("dest-id".to_string())));
    storage
        .expect_move_file()
        .with(eq(MERGED_ID), eq("dest-id"))
        .times(1)
        .returning(|_, _| Ok(()));

    let mut options = RunOptions::new(FOLDER);
    options.move_to_root = true;
    pipeline::run(&storage, None::<&MockNotifier>, &options)
        .await
        .expect("pipeline should succeed");
}

#[tokio::test]
async fn notifier_receives_the_completion_payload() {
    let mut storage = MockStorage::new();
    expect_valid_folder(&mut storage);
    storage
        .expect_list_files()
        .times(1)
        .returning(|_, _| Ok(vec![remote("id-c1", "chunk_1_a.pdf", "t")]));
    let pdf = sample_pdf("x", 1);
    storage
        .expect_download()
        .returning(move |_| Ok(pdf.clone()));
    expect_upload_capturing(&mut storage, Arc::new(Mutex::new(None)));

    let mut notifier = MockNotifier::new();
    notifier
        .expect_merge_complete()
        .withf(|event| {
            event.folder_id == FOLDER
                && event.file_id == MERGED_ID
                && event.url == MERGED_URL
                && !event.clean_chunks
        })
        .times(1)
        .returning(|_| Ok(()));

    let options = RunOptions::new(FOLDER);
    pipeline::run(&storage, Some(&notifier), &options)
        .await
        .expect("pipeline should succeed");
}

#[tokio::test]
async fn notify_failure_is_fatal() {
    let mut storage = MockStorage::new();
    expect_valid_folder(&mut storage);
    storage
        .expect_list_files()
        .times(1)
        .returning(|_, _| Ok(vec![remote("id-c1", "chunk_1_a.pdf", "t")]));
    let pdf = sample_pdf("x", 1);
    storage
        .expect_download()
        .returning(move |_| Ok(pdf.clone()));
    expect_upload_capturing(&mut storage, Arc::new(Mutex::new(None)));

    let mut notifier = MockNotifier::new();
    notifier
        .expect_merge_complete()
        .returning(|_| Err(NotifyError::Status(500, "server error".to_string())));

    let options = RunOptions::new(FOLDER);
    let err = pipeline::run(&storage, Some(&notifier), &options)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Notify(_)));
}

#[tokio::test]
async fn download_failure_is_fatal() {
    let mut storage = MockStorage::new();
    expect_valid_folder(&mut storage);
    storage
        .expect_list_files()
        .times(1)
        .returning(|_, _| Ok(vec![remote("id-c1", "chunk_1_a.pdf", "t")]));
    storage
        .expect_download()
        .returning(|_| Err(StorageError::Transfer("connection reset".to_string())));

    let err = pipeline::run(&storage, None::<&MockNotifier>, &RunOptions::new(FOLDER))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Transfer(_)));
}

#[tokio::test]
async fn local_copy_is_written_when_requested() {
    let mut storage = MockStorage::new();
    expect_valid_folder(&mut storage);
    storage
        .expect_list_files()
        .times(1)
        .returning(|_, _| Ok(vec![remote("id-c1", "chunk_1_a.pdf", "t")]));
    let pdf = sample_pdf("x", 2);
    storage
        .expect_download()
        .returning(move |_| Ok(pdf.clone()));
    expect_upload_capturing(&mut storage, Arc::new(Mutex::new(None)));

    let dir = tempfile::tempdir().unwrap();
    let mut options = RunOptions::new(FOLDER);
    options.save_local = Some(dir.path().to_path_buf());
    options.output_name = Some("merged_local.pdf".to_string());
    pipeline::run(&storage, None::<&MockNotifier>, &options)
        .await
        .expect("pipeline should succeed");

    let saved = std::fs::read(dir.path().join("merged_local.pdf")).expect("local copy exists");
    assert_eq!(page_count(&saved).unwrap(), 2);
}
