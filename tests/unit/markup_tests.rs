/*!
 * Tests for markup segmentation and tag repositioning
 */

use loctrans::markup::{
    extract_tag_positions, group_units, has_translatable_text, join, reconstruct, segment, Segment, TagPosition,
    Unit,
};

fn plain(text: &str) -> Segment {
    Segment::Plain(text.to_string())
}

fn tag(raw: &str) -> Segment {
    Segment::Tag(raw.to_string())
}

#[test]
fn test_segment_withColorSpan_shouldSplitTagsAndContent() {
    let segments = segment("<color=#ffa500>史诗诡术：2.2%</color>");
    assert_eq!(
        segments,
        vec![tag("<color=#ffa500>"), plain("史诗诡术：2.2%"), tag("</color>")]
    );
}

#[test]
fn test_segment_withoutTags_shouldReturnSinglePlainRun() {
    assert_eq!(segment("普通文本"), vec![plain("普通文本")]);
}

#[test]
fn test_segment_withEmptyString_shouldReturnNothing() {
    assert!(segment("").is_empty());
}

#[test]
fn test_segment_withAdjacentTags_shouldNotEmitEmptyPlainRuns() {
    let segments = segment("<color=red></color><color=blue>x</color>");
    assert_eq!(
        segments,
        vec![
            tag("<color=red>"),
            tag("</color>"),
            tag("<color=blue>"),
            plain("x"),
            tag("</color>"),
        ]
    );
}

#[test]
fn test_segment_withOtherMarkup_shouldTreatItAsPlain() {
    let segments = segment("<b>粗体</b>");
    assert_eq!(segments, vec![plain("<b>粗体</b>")]);
}

#[test]
fn test_join_afterSegment_shouldReproduceInput() {
    let inputs = [
        "",
        "plain",
        "<color=#fff>a</color>",
        "前<color=#ff0000>中</color>后",
        "</color>stray<color=#1>",
        "<color=#fff broken",
        "a<color=x><color=y>b</color></color>c",
    ];
    for input in inputs {
        assert_eq!(join(&segment(input)), input, "round trip failed for {:?}", input);
    }
}

#[test]
fn test_group_units_withWellFormedSpan_shouldPair() {
    let units = group_units(&segment("获得<color=#00ff00>100金币</color>奖励"));
    assert_eq!(
        units,
        vec![
            Unit::Text("获得".to_string()),
            Unit::Paired {
                open: "<color=#00ff00>".to_string(),
                content: "100金币".to_string(),
                close: "</color>".to_string(),
            },
            Unit::Text("奖励".to_string()),
        ]
    );
}

#[test]
fn test_group_units_withEmptySpan_shouldPairWithEmptyContent() {
    let units = group_units(&segment("<color=red></color>"));
    assert_eq!(
        units,
        vec![Unit::Paired {
            open: "<color=red>".to_string(),
            content: String::new(),
            close: "</color>".to_string(),
        }]
    );
}

#[test]
fn test_group_units_withNestedSpans_shouldPairInnerAndLeaveOuterLoose() {
    let units = group_units(&segment("<color=a><color=b>x</color></color>"));
    assert_eq!(
        units,
        vec![
            Unit::Loose("<color=a>".to_string()),
            Unit::Paired {
                open: "<color=b>".to_string(),
                content: "x".to_string(),
                close: "</color>".to_string(),
            },
            Unit::Loose("</color>".to_string()),
        ]
    );
}

#[test]
fn test_group_units_withUnclosedSpan_shouldLeaveTagLoose() {
    let units = group_units(&segment("<color=#fff>未闭合"));
    assert_eq!(
        units,
        vec![Unit::Loose("<color=#fff>".to_string()), Unit::Text("未闭合".to_string())]
    );
}

#[test]
fn test_has_translatable_text_withTagsAndWhitespaceOnly_shouldBeFalse() {
    assert!(!has_translatable_text(&segment("<color=red> </color>")));
    assert!(!has_translatable_text(&segment("")));
    assert!(has_translatable_text(&segment("<color=red>a</color>")));
}

#[test]
fn test_extract_tag_positions_shouldCountCharacters() {
    let (plain_text, positions) = extract_tag_positions(&segment("你好<color=red>世界</color>!"));
    assert_eq!(plain_text, "你好世界!");
    assert_eq!(
        positions,
        vec![
            TagPosition { offset: 2, raw: "<color=red>".to_string() },
            TagPosition { offset: 4, raw: "</color>".to_string() },
        ]
    );
}

#[test]
fn test_reconstruct_withUntranslatedText_shouldRestoreOriginal() {
    let inputs = ["你好<color=red>世界</color>!", "</color>a<color=b>", "<color=x>"];
    for input in inputs {
        let segments = segment(input);
        let (plain_text, positions) = extract_tag_positions(&segments);
        assert_eq!(reconstruct(&plain_text, &positions, &plain_text), join(&segments));
    }
}

#[test]
fn test_reconstruct_withLongerTranslation_shouldScaleOffsets() {
    // "ab|cd" -> 8 chars, ratio 2, offset 2 -> 4
    let positions = vec![TagPosition { offset: 2, raw: "<color=red>".to_string() }];
    assert_eq!(reconstruct("abcdefgh", &positions, "abcd"), "abcd<color=red>efgh");
}

#[test]
fn test_reconstruct_withShorterTranslation_shouldRoundOffsets() {
    // offset 1 of 3 chars -> 1 * 2/3 = 0.67 -> 1
    let positions = vec![TagPosition { offset: 1, raw: "</color>".to_string() }];
    assert_eq!(reconstruct("xy", &positions, "abc"), "x</color>y");
}

#[test]
fn test_reconstruct_withOffsetAtEnd_shouldClampToLength() {
    let positions = vec![TagPosition { offset: 5, raw: "</color>".to_string() }];
    assert_eq!(reconstruct("สวัสดี", &positions, "12345"), "สวัสดี</color>");
}

#[test]
fn test_reconstruct_withEmptyOriginal_shouldUseRatioOne() {
    let positions = vec![TagPosition { offset: 0, raw: "<color=red>".to_string() }];
    assert_eq!(reconstruct("abc", &positions, ""), "<color=red>abc");
}

#[test]
fn test_reconstruct_withNoPositions_shouldReturnTranslation() {
    assert_eq!(reconstruct("translated", &[], "原文"), "translated");
}
