//! End-to-end labeling runs against an in-memory mailbox

mod common;

use common::{fake_gmail, message, simple_message, FetchFailure, MockGmailClient};
use gmail_labeler::approval::ApprovalTable;
use gmail_labeler::client::GmailClient;
use gmail_labeler::error::GmailError;
use gmail_labeler::keywords::KeywordList;
use gmail_labeler::label_manager::LabelResolver;
use gmail_labeler::labeler::{LabelerOptions, ProgressCallback, ThreadLabeler, ThreadOutcome};
use gmail_labeler::models::ThreadRef;
use gmail_labeler::retry::RetryPolicy;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

fn approval() -> ApprovalTable {
    ApprovalTable::from_entries(vec![
        ("ann@example.com", Some("Austin")),
        ("bob@example.com", None),
        ("carol@example.com", Some("Dallas")),
    ])
}

fn options() -> LabelerOptions {
    LabelerOptions {
        retry: RetryPolicy::immediate(3),
        ..Default::default()
    }
}

fn labeler(client: Arc<dyn GmailClient>, keywords: KeywordList, options: LabelerOptions) -> ThreadLabeler {
    ThreadLabeler::new(
        Arc::clone(&client),
        LabelResolver::new(client),
        approval(),
        keywords,
        options,
    )
}

#[tokio::test]
async fn test_approved_sender_with_category_gets_combined_label() {
    let (fake, client) = fake_gmail();
    fake.add_thread(
        "t1",
        vec![simple_message("m1", "Ann <ann@example.com>", "me@example.com", None)],
    );

    let summary = labeler(client, KeywordList::default(), options())
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(fake.applied_names("t1"), vec!["Cleared + Austin"]);
    assert_eq!(summary.threads_listed, 1);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.cleared, 1);
    assert_eq!(summary.categorized, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.labels_created, vec!["Cleared + Austin"]);
}

#[tokio::test]
async fn test_all_label_families_applied_in_order() {
    let (fake, client) = fake_gmail();
    fake.add_thread(
        "t1",
        vec![
            simple_message(
                "m1",
                "Bob <bob@example.com>",
                "Carol <carol@example.com>",
                Some("Please find the INVOICE attached"),
            ),
            simple_message("m2", "carol@example.com", "bob@example.com", Some("thanks")),
        ],
    );

    let keywords = KeywordList::new(["invoice", "austin"]);
    let summary = labeler(client, keywords, options())
        .run(&CancellationToken::new())
        .await
        .unwrap();

    // carol sent m2, so her category wins the cleared label
    assert_eq!(fake.applied_names("t1"), vec!["Cleared + Dallas", "invoice"]);
    assert_eq!(summary.cleared, 1);
    assert_eq!(summary.categorized, 1);
    assert_eq!(summary.keyword_labeled, 1);
    assert_eq!(fake.apply_calls(), 1);
}

#[tokio::test]
async fn test_category_from_recipient_only() {
    let (fake, client) = fake_gmail();
    fake.add_thread(
        "t1",
        vec![simple_message("m1", "bob@example.com", "carol@example.com", None)],
    );

    let summary = labeler(client, KeywordList::default(), options())
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(fake.applied_names("t1"), vec!["Cleared", "Dallas"]);
    assert_eq!(summary.cleared, 1);
    assert_eq!(summary.categorized, 0);
}

#[tokio::test]
async fn test_unapproved_thread_skipped() {
    let (fake, client) = fake_gmail();
    fake.add_thread(
        "t1",
        vec![simple_message("m1", "stranger@else.com", "me@example.com", Some("hello"))],
    );
    fake.add_thread(
        "t2",
        vec![message("m2", &[("From", "undisclosed-recipients:;")], None)],
    );

    let summary = labeler(client, KeywordList::default(), options())
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(fake.apply_calls(), 0);
    assert!(fake.created_labels().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_fetch_failing_three_times_counts_one_failure() {
    let (fake, client) = fake_gmail();
    fake.add_thread(
        "t1",
        vec![simple_message("m1", "ann@example.com", "me@example.com", None)],
    );
    fake.add_thread(
        "t2",
        vec![simple_message("m2", "bob@example.com", "me@example.com", None)],
    );
    fake.fail_fetch("t1", 3, FetchFailure::Transient);

    let options = LabelerOptions {
        retry: RetryPolicy::default(),
        ..Default::default()
    };
    let summary = labeler(client, KeywordList::default(), options)
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(fake.fetch_calls("t1"), 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failed_thread_ids, vec!["t1"]);
    assert_eq!(summary.processed, 2);
    assert_eq!(fake.applied_names("t2"), vec!["Cleared"]);
}

#[tokio::test]
async fn test_fetch_recovers_within_attempt_budget() {
    let (fake, client) = fake_gmail();
    fake.add_thread(
        "t1",
        vec![simple_message("m1", "ann@example.com", "me@example.com", None)],
    );
    fake.fail_fetch("t1", 2, FetchFailure::Transient);

    let summary = labeler(client, KeywordList::default(), options())
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(fake.fetch_calls("t1"), 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(fake.applied_names("t1"), vec!["Cleared + Austin"]);
}

#[tokio::test]
async fn test_not_found_thread_not_retried() {
    let (fake, client) = fake_gmail();
    fake.add_thread(
        "t1",
        vec![simple_message("m1", "ann@example.com", "me@example.com", None)],
    );
    fake.fail_fetch("t1", 1, FetchFailure::NotFound);

    let summary = labeler(client, KeywordList::default(), options())
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(fake.fetch_calls("t1"), 1);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn test_label_resolution_failure_isolated_to_thread() {
    let (fake, client) = fake_gmail();
    fake.add_thread(
        "t1",
        vec![simple_message("m1", "ann@example.com", "me@example.com", None)],
    );
    fake.add_thread(
        "t2",
        vec![simple_message("m2", "bob@example.com", "me@example.com", None)],
    );
    fake.fail_create("Cleared + Austin");

    let summary = labeler(client, KeywordList::default(), options())
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failed_thread_ids, vec!["t1"]);
    assert!(fake.applied_names("t1").is_empty());
    assert_eq!(fake.applied_names("t2"), vec!["Cleared"]);
    assert_eq!(summary.cleared, 1);
}

#[tokio::test]
async fn test_shared_label_created_once_across_threads() {
    let (fake, client) = fake_gmail();
    for id in ["t1", "t2", "t3"] {
        fake.add_thread(
            id,
            vec![simple_message("m", "ann@example.com", "me@example.com", None)],
        );
    }

    let summary = labeler(client, KeywordList::default(), options())
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(fake.created_labels(), vec!["Cleared + Austin"]);
    assert_eq!(summary.cleared, 3);
    for id in ["t1", "t2", "t3"] {
        assert_eq!(fake.applied_names(id), vec!["Cleared + Austin"]);
    }
}

#[tokio::test]
async fn test_existing_label_reused_regardless_of_case() {
    let (fake, client) = fake_gmail();
    fake.add_label("Label_42", "cleared + austin");
    fake.add_thread(
        "t1",
        vec![simple_message("m1", "ann@example.com", "me@example.com", None)],
    );

    labeler(client, KeywordList::default(), options())
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert!(fake.created_labels().is_empty());
    assert_eq!(fake.applied_names("t1"), vec!["cleared + austin"]);
}

#[tokio::test]
async fn test_second_run_creates_nothing() {
    let (fake, client) = fake_gmail();
    fake.add_thread(
        "t1",
        vec![simple_message("m1", "ann@example.com", "carol@example.com", None)],
    );

    labeler(Arc::clone(&client), KeywordList::default(), options())
        .run(&CancellationToken::new())
        .await
        .unwrap();
    let second = labeler(client, KeywordList::default(), options())
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(fake.created_labels(), vec!["Cleared + Austin", "Dallas"]);
    assert!(second.labels_created.is_empty());
    assert_eq!(second.cleared, 1);
}

#[tokio::test]
async fn test_max_threads_bounds_the_batch() {
    let (fake, client) = fake_gmail();
    for id in ["t1", "t2", "t3", "t4"] {
        fake.add_thread(
            id,
            vec![simple_message("m", "bob@example.com", "me@example.com", None)],
        );
    }

    let options = LabelerOptions {
        max_threads: 2,
        ..options()
    };
    let summary = labeler(client, KeywordList::default(), options)
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.threads_listed, 2);
    assert_eq!(fake.total_fetch_calls(), 2);
    assert!(fake.applied_names("t3").is_empty());
}

#[tokio::test]
async fn test_cancellation_stops_between_threads() {
    let (fake, client) = fake_gmail();
    for id in ["t1", "t2", "t3"] {
        fake.add_thread(
            id,
            vec![simple_message("m", "bob@example.com", "me@example.com", None)],
        );
    }
    let cancel = CancellationToken::new();
    fake.cancel_after(1, cancel.clone());

    let summary = labeler(client, KeywordList::default(), options())
        .run(&cancel)
        .await
        .unwrap();

    // The in-flight thread finishes, the rest are untouched
    assert!(summary.cancelled);
    assert_eq!(summary.processed, 1);
    assert_eq!(fake.applied_names("t1"), vec!["Cleared"]);
    assert_eq!(fake.total_fetch_calls(), 1);
}

#[tokio::test]
async fn test_cancelled_before_start_touches_nothing() {
    let (fake, client) = fake_gmail();
    fake.add_thread(
        "t1",
        vec![simple_message("m1", "bob@example.com", "me@example.com", None)],
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = labeler(client, KeywordList::default(), options())
        .run(&cancel)
        .await
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.threads_listed, 1);
    assert_eq!(summary.processed, 0);
    assert_eq!(fake.total_fetch_calls(), 0);
}

#[tokio::test]
async fn test_approved_sender_after_blank_header_component_is_cleared() {
    let (fake, client) = fake_gmail();
    fake.add_thread(
        "t1",
        vec![simple_message(
            "m1",
            ", Ann <ann@example.com>",
            "me@example.com, , other@example.com",
            None,
        )],
    );

    let summary = labeler(client, KeywordList::default(), options())
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(fake.applied_names("t1"), vec!["Cleared + Austin"]);
    assert_eq!(summary.cleared, 1);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn test_listing_failure_aborts_run() {
    let (fake, client) = fake_gmail();
    fake.fail_listing();

    let result = labeler(client, KeywordList::default(), options())
        .run(&CancellationToken::new())
        .await;

    assert!(matches!(result, Err(GmailError::Forbidden(_))));
    assert_eq!(fake.total_fetch_calls(), 0);
}

#[tokio::test]
async fn test_transient_listing_failure_is_not_retried() {
    let mut mock = MockGmailClient::new();
    mock.expect_list_recent_threads()
        .times(1)
        .returning(|_| Err(GmailError::NetworkError("connection reset".to_string())));
    mock.expect_get_thread_messages().never();

    let result = labeler(Arc::new(mock), KeywordList::default(), options())
        .run(&CancellationToken::new())
        .await;

    assert!(matches!(result, Err(GmailError::NetworkError(_))));
}

#[tokio::test]
async fn test_dry_run_classifies_without_touching_labels() {
    let mut mock = MockGmailClient::new();
    mock.expect_list_recent_threads()
        .times(1)
        .returning(|_| Ok(vec![ThreadRef::new("t1"), ThreadRef::new("t2")]));
    mock.expect_get_thread_messages()
        .times(2)
        .returning(|thread_id| {
            let from = if thread_id == "t1" {
                "ann@example.com"
            } else {
                "stranger@else.com"
            };
            Ok(vec![simple_message("m", from, "me@example.com", Some("austin trip"))])
        });
    mock.expect_list_labels().never();
    mock.expect_create_label().never();
    mock.expect_apply_labels().never();

    let options = LabelerOptions {
        dry_run: true,
        ..options()
    };
    let summary = labeler(Arc::new(mock), KeywordList::new(["Austin"]), options)
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.cleared, 1);
    assert_eq!(summary.categorized, 1);
    assert_eq!(summary.keyword_labeled, 2);
    assert_eq!(summary.skipped, 0);
    assert!(summary.labels_created.is_empty());
}

#[tokio::test]
async fn test_apply_failure_marks_thread_failed() {
    let mut mock = MockGmailClient::new();
    mock.expect_list_recent_threads()
        .returning(|_| Ok(vec![ThreadRef::new("t1")]));
    mock.expect_get_thread_messages()
        .returning(|_| Ok(vec![simple_message("m", "bob@example.com", "me@example.com", None)]));
    mock.expect_list_labels()
        .returning(|| Ok(vec![common::label("Label_1", "Cleared")]));
    mock.expect_create_label().never();
    mock.expect_apply_labels()
        .times(1)
        .returning(|_, _| Err(GmailError::Forbidden("read-only".to_string())));

    let summary = labeler(Arc::new(mock), KeywordList::default(), options())
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.cleared, 0);
}

#[tokio::test]
async fn test_process_thread_outcomes() {
    let (fake, client) = fake_gmail();
    fake.add_thread(
        "t1",
        vec![simple_message("m1", "bob@example.com", "me@example.com", None)],
    );
    fake.add_thread(
        "t2",
        vec![simple_message("m2", "nobody@else.com", "me@example.com", None)],
    );

    let mut labeler = labeler(client, KeywordList::default(), options());

    assert!(matches!(
        labeler.process_thread("t1").await,
        ThreadOutcome::Labeled(plan) if plan.labels() == vec!["Cleared".to_string()]
    ));
    assert_eq!(labeler.process_thread("t2").await, ThreadOutcome::Skipped);
    assert!(matches!(
        labeler.process_thread("missing").await,
        ThreadOutcome::Failed(_)
    ));
}

#[tokio::test]
async fn test_progress_reports_each_thread() {
    let (fake, client) = fake_gmail();
    for id in ["t1", "t2"] {
        fake.add_thread(
            id,
            vec![simple_message("m", "bob@example.com", "me@example.com", None)],
        );
    }
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let progress: ProgressCallback = Arc::new(move |done, total| {
        sink.lock().unwrap().push((done, total));
    });

    labeler(client, KeywordList::default(), options())
        .with_progress(progress)
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![(1, 2), (2, 2)]);
}
