//! Monitor wired to mocked Twitter and Telegram endpoints

use serde_json::json;
use std::sync::Arc;
use trendbot::config::Config;
use trendbot::models::{Platform, TopicId};
use trendbot::notifications::{NotificationManager, TelegramChannel};
use trendbot::scheduler::{Monitor, SOURCE_FAILURE_ALERT_THRESHOLD};
use trendbot::sources::TwitterSource;
use trendbot::storage::TrendStore;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{telegram_config, twitter_config};

async fn mount_search(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "public_metrics": { "retweet_count": 3, "reply_count": 1, "like_count": 25, "quote_count": 0 } }
            ]
        })))
        .mount(server)
        .await;
}

fn monitor_with(server: &MockServer) -> Monitor {
    let mut config = Config::default();
    config.twitter = twitter_config(&server.uri());
    config.telegram = telegram_config(&server.uri());

    let mut notifier = NotificationManager::new().with_dedup_window(60);
    notifier.add_channel(Box::new(TelegramChannel::new(&config.telegram).unwrap()));

    let store = Arc::new(TrendStore::in_memory().unwrap());
    let source = TwitterSource::new(&config.twitter).unwrap();

    let mut monitor = Monitor::new(config, store, Arc::new(notifier)).unwrap();
    monitor.add_source(Box::new(source), 30).unwrap();
    monitor
}

#[tokio::test]
async fn test_poll_scores_persists_and_labels() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1.1/trends/place.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "trends": [
                { "name": "#RustLang", "tweet_volume": 5400 },
                { "name": "Eclipse", "tweet_volume": null }
            ]
        }])))
        .mount(&server)
        .await;
    mount_search(&server).await;

    let monitor = monitor_with(&server);
    let results = monitor.poll_all().await;

    assert_eq!(results.len(), 1);
    let (name, report) = &results[0];
    assert_eq!(name, "twitter");
    let report = report.as_ref().unwrap();
    assert_eq!(report.collected, 2);
    assert_eq!(report.scored, 2);
    assert_eq!(report.rejected, 0);
    assert!(!report.alerted);

    let stats = monitor.store().stats().unwrap();
    assert_eq!(stats.trends, 2);
    assert_eq!(stats.observations, 2);

    let id = TopicId::new(Platform::Twitter, "#RustLang");
    assert_eq!(monitor.label(&id).as_deref(), Some("#RustLang"));
    assert_eq!(monitor.with_tracker(|t| t.len()).await, 2);

    let status = &monitor.source_statuses()[0];
    assert!(status.last_success.is_some());
    assert_eq!(status.consecutive_failures, 0);
}

#[tokio::test]
async fn test_repeated_failures_alert_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1.1/trends/place.json"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .and(body_string_contains("Source failure"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": {} })))
        .expect(1)
        .mount(&server)
        .await;

    let monitor = monitor_with(&server);
    for _ in 0..SOURCE_FAILURE_ALERT_THRESHOLD + 1 {
        let results = monitor.poll_all().await;
        assert!(results[0].1.is_err());
    }

    let status = &monitor.source_statuses()[0];
    assert_eq!(status.consecutive_failures, SOURCE_FAILURE_ALERT_THRESHOLD + 1);
    assert!(status.last_error.is_some());
    assert!(status.last_success.is_none());
}

#[tokio::test]
async fn test_single_check_reports_sources_and_channels() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1.1/trends/place.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "trends": [ { "name": "#Solo", "tweet_volume": 10 } ]
        }])))
        .mount(&server)
        .await;
    mount_search(&server).await;
    Mock::given(method("GET"))
        .and(path("/bot123:abc/getMe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": { "id": 1, "username": "trendbot" }
        })))
        .mount(&server)
        .await;

    let monitor = monitor_with(&server);
    let report = monitor.run_single_check().await;

    assert_eq!(report.sources, vec![("twitter".to_string(), Ok(1))]);
    assert_eq!(report.channels, vec![("telegram".to_string(), true)]);
}

#[tokio::test]
async fn test_daily_summary_carries_platform_breakdown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1.1/trends/place.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "trends": [
                { "name": "#RustLang", "tweet_volume": 5400 },
                { "name": "Eclipse", "tweet_volume": null }
            ]
        }])))
        .mount(&server)
        .await;
    mount_search(&server).await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .and(body_string_contains("2 trends tracked"))
        .and(body_string_contains("Total records: 2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": {} })))
        .expect(1)
        .mount(&server)
        .await;

    let monitor = monitor_with(&server);
    monitor.poll_all().await;

    let summary = monitor.send_daily_summary().await;
    assert_eq!(summary.tracked_topics, 2);

    let activity = monitor.activity_report(chrono::Utc::now()).unwrap();
    assert_eq!(activity.platform(Platform::Twitter).unwrap().records, 2);
}
