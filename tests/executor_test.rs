// Test case execution, screenshots and consent against the scripted session
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::time::Duration;

use webmatrix::errors::CheckError;
use webmatrix::{
    Assertion, Check, ConsentHandler, ElementResolver, Locator, NestedLocator, Outcome,
    RunResult, ScreenshotCache, ScreenshotKey, ScrollPadding, Session, TestCase, TestCaseExecutor,
};

mod common;
use common::{FakeElement, FakePage, Harness};

fn executor(harness: &Harness) -> TestCaseExecutor {
    TestCaseExecutor::new(
        ElementResolver::new(),
        ScreenshotCache::new(harness.screenshot_dir(), ScrollPadding::default()),
        Duration::ZERO,
    )
}

fn visible(name: &str) -> Assertion {
    Assertion {
        name: name.to_string(),
        check: Check::IsVisible { expected: true },
    }
}

fn css(name: &str, property: &str, expected: &str) -> Assertion {
    Assertion {
        name: name.to_string(),
        check: Check::CssProperty {
            property: property.to_string(),
            expected: expected.to_string(),
        },
    }
}

fn labels(results: &[RunResult]) -> Vec<(String, String)> {
    results
        .iter()
        .filter_map(RunResult::as_assertion)
        .map(|r| (r.subject.clone(), r.assertion.clone()))
        .collect()
}

#[tokio::test]
async fn test_hero_visible_with_screenshot() {
    let harness = Harness::new();
    let hero = Locator::id("hero-banner");
    let (session, stats) = harness
        .session(FakePage::new().with(hero.clone(), FakeElement::visible()))
        .await;
    let test_case = TestCase {
        name: "hero".to_string(),
        locator: hero,
        assertions: vec![visible("isVisible")],
        locators: vec![],
    };

    let mut results = Vec::new();
    executor(&harness)
        .execute(&session, &test_case, &harness.ctx(), &mut results)
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    let result = results[0].as_assertion().unwrap();
    assert_eq!(result.test_case, "hero");
    assert_eq!(result.outcome, Outcome::Pass);

    let screenshot = harness
        .screenshot_dir()
        .join("chrome/desktop/1280x800-hero.png");
    assert!(screenshot.exists());
    assert_eq!(stats.captures.load(Ordering::SeqCst), 1);

    let log = harness.log_contents();
    assert!(log.contains("Executing test case: hero"));
    assert!(log.contains("Took screenshot for test case: hero"));
    assert!(log.contains("Assertion passed: 1280x800, hero, hero, isVisible, isVisible"));
}

#[tokio::test]
async fn test_screenshot_taken_once_per_identity() {
    let harness = Harness::new();
    let hero = Locator::id("hero-banner");
    let (session, stats) = harness
        .session(FakePage::new().with(hero.clone(), FakeElement::visible()))
        .await;
    let cache = ScreenshotCache::new(harness.screenshot_dir(), ScrollPadding::default());
    let key = ScreenshotKey::new(&harness.combination, "hero");
    let element = session.find_element(&hero).await.unwrap();

    assert!(
        cache
            .ensure_captured(&session, &key, &element, &harness.ctx())
            .await
            .unwrap()
    );
    assert!(
        !cache
            .ensure_captured(&session, &key, &element, &harness.ctx())
            .await
            .unwrap()
    );

    assert_eq!(stats.captures.load(Ordering::SeqCst), 1);
    assert!(cache.path_for(&key).exists());
}

#[tokio::test]
async fn test_existing_screenshot_is_kept() {
    let harness = Harness::new();
    let hero = Locator::id("hero-banner");
    let (session, stats) = harness
        .session(FakePage::new().with(hero.clone(), FakeElement::visible()))
        .await;
    let cache = ScreenshotCache::new(harness.screenshot_dir(), ScrollPadding::default());
    let key = ScreenshotKey::new(&harness.combination, "hero");
    let path = cache.path_for(&key);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"previous run").unwrap();

    let element = session.find_element(&hero).await.unwrap();
    cache
        .ensure_captured(&session, &key, &element, &harness.ctx())
        .await
        .unwrap();

    assert_eq!(stats.captures.load(Ordering::SeqCst), 0);
    assert_eq!(std::fs::read(&path).unwrap(), b"previous run");
}

#[tokio::test]
async fn test_results_follow_declared_order() {
    let harness = Harness::new();
    let card = Locator::id("card");
    let title = Locator::id("card-title");
    let link = Locator::id("card-link");
    let (session, _) = harness
        .session(
            FakePage::new()
                .with(card.clone(), FakeElement::visible().with_css("color", "red"))
                .with(title.clone(), FakeElement::visible())
                .with(link.clone(), FakeElement::visible()),
        )
        .await;

    let test_case = TestCase {
        name: "card".to_string(),
        locator: card,
        assertions: vec![visible("a1"), css("a2", "color", "red")],
        locators: vec![
            NestedLocator {
                name: "title".to_string(),
                locator: title,
                assertions: vec![visible("b1")],
            },
            NestedLocator {
                name: "link".to_string(),
                locator: link,
                assertions: vec![visible("c1"), visible("c2")],
            },
        ],
    };

    let mut results = Vec::new();
    executor(&harness)
        .execute(&session, &test_case, &harness.ctx(), &mut results)
        .await
        .unwrap();

    let expected: Vec<(String, String)> = [
        ("card", "a1"),
        ("card", "a2"),
        ("title", "b1"),
        ("link", "c1"),
        ("link", "c2"),
    ]
    .iter()
    .map(|(s, a)| (s.to_string(), a.to_string()))
    .collect();
    assert_eq!(labels(&results), expected);
}

#[tokio::test]
async fn test_unreadable_value_does_not_stop_test_case() {
    let harness = Harness::new();
    let card = Locator::id("card");
    let (session, _) = harness
        .session(FakePage::new().with(
            card.clone(),
            FakeElement::visible().unreadable("color"),
        ))
        .await;
    let test_case = TestCase {
        name: "card".to_string(),
        locator: card,
        assertions: vec![css("color", "color", "red"), visible("visible")],
        locators: vec![],
    };

    let mut results = Vec::new();
    executor(&harness)
        .execute(&session, &test_case, &harness.ctx(), &mut results)
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    let first = results[0].as_assertion().unwrap();
    assert!(matches!(first.outcome, Outcome::Error { .. }));
    assert_eq!(first.property.as_deref(), Some("color"));
    assert_eq!(results[1].as_assertion().unwrap().outcome, Outcome::Pass);
    assert!(harness.log_contents().contains("Assertion errored"));
}

#[tokio::test(start_paused = true)]
async fn test_missing_nested_locator_keeps_earlier_results() {
    let harness = Harness::new();
    let card = Locator::id("card");
    let (session, _) = harness
        .session(FakePage::new().with(card.clone(), FakeElement::visible()))
        .await;
    let test_case = TestCase {
        name: "card".to_string(),
        locator: card,
        assertions: vec![visible("a1")],
        locators: vec![NestedLocator {
            name: "badge".to_string(),
            locator: Locator::id("badge"),
            assertions: vec![visible("b1")],
        }],
    };

    let mut results = Vec::new();
    let err = executor(&harness)
        .execute(&session, &test_case, &harness.ctx(), &mut results)
        .await
        .unwrap_err();

    assert!(matches!(err, CheckError::NotFound { attempts: 2, .. }));
    assert_eq!(labels(&results), vec![("card".to_string(), "a1".to_string())]);
    assert!(harness.log_contents().contains("Locating badge using id: badge"));
}

#[tokio::test]
async fn test_consent_dialog_accepted_when_visible() {
    let harness = Harness::new();
    let consent = ConsentHandler::default();
    let accept = Locator::id(webmatrix::consent::DEFAULT_ACCEPT_ID);
    let (session, stats) = harness
        .session(
            FakePage::new()
                .with(
                    Locator::id(webmatrix::consent::DEFAULT_DIALOG_ID),
                    FakeElement::visible(),
                )
                .with(accept.clone(), FakeElement::visible()),
        )
        .await;

    assert!(consent.maybe_dismiss(&session, &harness.ctx()).await.unwrap());
    assert_eq!(*stats.clicks.lock().unwrap(), vec![accept.to_string()]);

    let log = harness.log_contents();
    assert!(log.contains("Cookie popup detected"));
    assert!(log.contains("Accepted cookie popup"));
}

#[tokio::test]
async fn test_consent_absent_or_hidden_is_a_no_op() {
    let harness = Harness::new();
    let consent = ConsentHandler::default();

    let (session, stats) = harness.session(FakePage::new()).await;
    assert!(!consent.maybe_dismiss(&session, &harness.ctx()).await.unwrap());

    let (hidden, hidden_stats) = harness
        .session(FakePage::new().with(
            Locator::id(webmatrix::consent::DEFAULT_DIALOG_ID),
            FakeElement::default(),
        ))
        .await;
    assert!(!consent.maybe_dismiss(&hidden, &harness.ctx()).await.unwrap());

    assert!(stats.clicks.lock().unwrap().is_empty());
    assert!(hidden_stats.clicks.lock().unwrap().is_empty());
    assert!(!harness.log_contents().contains("Cookie popup detected"));
}

#[tokio::test]
async fn test_capture_scroll_uses_configured_padding() {
    let harness = Harness::new();
    let hero = Locator::id("hero-banner");
    let (session, stats) = harness
        .session(FakePage::new().with(hero.clone(), FakeElement::visible()))
        .await;
    let test_case = TestCase {
        name: "hero".to_string(),
        locator: hero,
        assertions: vec![],
        locators: vec![],
    };
    let executor = TestCaseExecutor::new(
        ElementResolver::new(),
        ScreenshotCache::new(
            harness.screenshot_dir(),
            ScrollPadding {
                top: 80,
                bottom: 40,
            },
        ),
        Duration::ZERO,
    );

    let mut results = Vec::new();
    executor
        .execute(&session, &test_case, &harness.ctx(), &mut results)
        .await
        .unwrap();

    // Plain scroll to the element, then the padded one right before capture
    let element = json!({ "fake-element": "id: hero-banner" });
    let scripts = stats.scripts.lock().unwrap().clone();
    assert_eq!(
        scripts,
        vec![
            vec![element.clone(), json!(0), json!(0)],
            vec![element, json!(80), json!(40)],
        ]
    );
    assert_eq!(stats.captures.load(Ordering::SeqCst), 1);
}
