// Unit tests for types module

use super::*;

#[test]
fn test_viewport_display_and_json() {
    let vp = Viewport::new(1280, 800);
    assert_eq!(vp.to_string(), "1280x800");

    let parsed: Viewport = serde_json::from_str(r#"{"width": 375, "height": 667}"#).unwrap();
    assert_eq!(parsed, Viewport::new(375, 667));
    assert!(serde_json::from_str::<Viewport>(r#"{"width": 375}"#).is_err());
}

#[test]
fn test_locator_strategy_names() {
    let parsed: LocatorStrategy = serde_json::from_str("\"className\"").unwrap();
    assert_eq!(parsed, LocatorStrategy::ClassName);

    let parsed: LocatorStrategy = serde_json::from_str("\"partialLinkText\"").unwrap();
    assert_eq!(parsed, LocatorStrategy::PartialLinkText);

    // Both spellings of xpath are accepted
    let parsed: LocatorStrategy = serde_json::from_str("\"xpath\"").unwrap();
    assert_eq!(parsed, LocatorStrategy::Xpath);
    let parsed: LocatorStrategy = serde_json::from_str("\"xPath\"").unwrap();
    assert_eq!(parsed, LocatorStrategy::Xpath);

    assert!(serde_json::from_str::<LocatorStrategy>("\"shadowRoot\"").is_err());
}

#[test]
fn test_locator_display() {
    assert_eq!(Locator::id("hero-banner").to_string(), "id: hero-banner");
    assert_eq!(
        Locator::new(LocatorStrategy::Css, "nav > a").to_string(),
        "css: nav > a"
    );
}

#[test]
fn test_assertion_kind_tags() {
    let kind: AssertionKind = serde_json::from_str("\"checkCSSProperty\"").unwrap();
    assert_eq!(kind, AssertionKind::CheckCssProperty);
    assert_eq!(kind.to_string(), "checkCSSProperty");

    // checkBase is the legacy name for baselineDiff
    let kind: AssertionKind = serde_json::from_str("\"checkBase\"").unwrap();
    assert_eq!(kind, AssertionKind::BaselineDiff);
    assert_eq!(serde_json::to_string(&kind).unwrap(), "\"baselineDiff\"");
}

#[test]
fn test_check_kind() {
    let check = Check::CssProperty {
        property: "color".to_string(),
        expected: "rgb(0, 0, 0)".to_string(),
    };
    assert_eq!(check.kind(), AssertionKind::CheckCssProperty);
    assert_eq!(
        Check::IsVisible { expected: true }.kind(),
        AssertionKind::IsVisible
    );
}

#[test]
fn test_baseline_lookup_first_table_wins() {
    let mut records = BaselineRecords::new();
    let mut first = HashMap::new();
    first.insert(
        "card".to_string(),
        StyleBaseline {
            properties: vec![("color".to_string(), "red".to_string())],
        },
    );
    let mut second = HashMap::new();
    second.insert(
        "card".to_string(),
        StyleBaseline {
            properties: vec![("color".to_string(), "blue".to_string())],
        },
    );
    second.insert("title".to_string(), StyleBaseline::default());
    records.push_table("desktop", first);
    records.push_table("desktop", second);

    let card = records.lookup("desktop", "card").unwrap();
    assert_eq!(card.properties[0].1, "red");
    assert!(records.lookup("desktop", "title").is_some());
    assert!(records.lookup("desktop", "footer").is_none());
    assert!(records.lookup("mobile", "card").is_none());
}
