//! Prompt assembly for the screenshot-driven loop.
//!
//! A step prompt has three layers: a system instruction that grows stricter
//! as the session gets stuck, replayed history turns (recent ones with their
//! screenshot), and the current user turn carrying all perception output.

use perceiver_visual::{truncate_chars, CursorColor, CursorObservation, Point, CANVAS_HEIGHT, CANVAS_WIDTH};
use serde::{Deserialize, Serialize};

use super::types::HistoryEntry;
use crate::llm_provider::{ChangeRequest, FunctionCall};

/// Cursor distance from the last move target worth pointing out.
pub const CURSOR_DRIFT_PX: f64 = 20.0;

/// Screenshot distance below which the page is treated as unchanged.
pub const SIMILAR_SCREEN_DISTANCE: u32 = 5;

pub const CURSOR_LEGEND: &str = r#"The mouse pointer is drawn as a coloured dot:
- RED: the pointer is over a non-clickable area
- GREEN: the pointer is over a clickable element (link, button)
- BLUE: the pointer is over a draggable element"#;

const CURSOR_INSTRUCTION: &str = r#"## Cursor
Look for the coloured dot before every decision. Only click when the dot is GREEN. If it is RED, move to a different element first. If you cannot see the dot at all, move the mouse to a visible element before doing anything else."#;

const STRATEGY_SHIFT: &str = r#"## Changing approach
When an action produced no visible change, do not repeat it. Pick a different element, a different screen area, or a different tool (scroll, keypress) on the next step."#;

const VISUAL_VERIFICATION_RED: &str = r#"## Visual verification
The cursor has been RED on recent steps, so it is not over anything clickable. Study the screenshot for buttons, links and input fields and move directly onto one of them."#;

const VISUAL_VERIFICATION_HIDDEN: &str = r#"## Visual verification
The cursor dot has not been visible on recent steps. Move to the centre of a clearly visible element so the dot can be confirmed before clicking."#;

const VISUAL_VERIFICATION_GENERIC: &str = r#"## Visual verification
Recent steps changed nothing on screen. Before acting, confirm the cursor colour and check that the element you want is actually under it."#;

const STUCK_GUIDANCE: &str = r#"## You are stuck
Several steps in a row produced no progress. Work through these alternatives instead of retrying:
1. Move to a completely different region of the screen.
2. Use scroll_wheel_down to reveal content below the fold.
3. Look for navigation menus, tabs or search boxes near the top of the page.
4. If a text field is focused, type with keypress instead of clicking.
5. If the objective already looks complete, call report_done."#;

const RESPONSE_FORMAT: &str = r#"## Response format
First write a short explanation of what you see and why you are choosing the next action. Then call exactly one tool."#;

const COORDINATE_REMINDER: &str = "Remember: x is the HORIZONTAL position (0-1920, left to right) and y is the VERTICAL position (0-1080, top to bottom).";

const RESPONSE_REMINDER: &str = "Explain your reasoning first, then call exactly one tool.";

const CURSOR_EMPHASIS: &str = "Find the coloured cursor dot in this screenshot before deciding. Your last actions did not change the page, so make sure the dot is GREEN before clicking.";

const HISTORY_IMAGE_CAPTION: &str = "This was the screen state that led to your following action.";

/// One piece of a prompt turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptPart {
    Text(String),
    /// Encoded JPEG
    Image(Vec<u8>),
    Call(FunctionCall),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTurn {
    pub role: TurnRole,
    pub parts: Vec<PromptPart>,
}

impl PromptTurn {
    pub fn user(parts: Vec<PromptPart>) -> Self {
        Self {
            role: TurnRole::User,
            parts,
        }
    }

    pub fn model(parts: Vec<PromptPart>) -> Self {
        Self {
            role: TurnRole::Model,
            parts,
        }
    }
}

/// Everything sent to the action model for one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptContext {
    pub system_instruction: String,
    pub turns: Vec<PromptTurn>,
    pub current: Vec<PromptPart>,
}

impl PromptContext {
    /// Text of the current user turn.
    pub fn current_text(&self) -> String {
        self.current
            .iter()
            .filter_map(|part| match part {
                PromptPart::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn current_image(&self) -> Option<&[u8]> {
        self.current.iter().find_map(|part| match part {
            PromptPart::Image(bytes) => Some(bytes.as_slice()),
            _ => None,
        })
    }
}

/// Perception output gathered for the current step.
#[derive(Debug, Clone, Default)]
pub struct StepView {
    pub stuck_counter: u32,
    pub cursor: Option<CursorObservation>,
    /// Target of the latest `move_mouse`
    pub expected_cursor: Option<Point>,
    pub diversity_hint: Option<String>,
    /// Formatted change description for the previous step
    pub changes: Option<String>,
    /// Rendered DOM listing; empty when no snapshot was usable
    pub dom_listing: String,
    pub clickable_count: usize,
    /// Rendered OCR listing; empty when OCR was skipped
    pub ocr_listing: String,
    pub markdown: Option<String>,
    /// Fingerprint distance to the previous screenshot
    pub screen_distance: Option<u32>,
    /// Screenshot sent with the current turn, annotated when possible
    pub screenshot: Vec<u8>,
}

/// Whether OCR output belongs in this step's prompt.
pub fn wants_ocr(dom_listing: &str, clickable_count: usize, stuck: u32) -> bool {
    dom_listing.trim().is_empty() || clickable_count < 3 || stuck > 1
}

/// Assemble the full prompt for one step.
pub fn build_prompt(
    objective: &str,
    history: &[HistoryEntry],
    view: &StepView,
    history_image_turns: usize,
    markdown_limit: usize,
) -> PromptContext {
    let mut current = vec![PromptPart::Text(current_user_text(history, view, markdown_limit))];
    if !view.screenshot.is_empty() {
        current.push(PromptPart::Image(view.screenshot.clone()));
    }
    PromptContext {
        system_instruction: system_instruction(objective, view.stuck_counter, view.cursor.map(|c| c.color)),
        turns: history_turns(history, history_image_turns),
        current,
    }
}

/// System instruction; visual verification and stuck guidance are added
/// once the session stalls.
pub fn system_instruction(objective: &str, stuck: u32, cursor: Option<CursorColor>) -> String {
    let mut sections = vec![
        format!(
            "You control a web browser through a mouse and keyboard to achieve this objective:\n{}",
            objective
        ),
        "The screenshot you receive each step is your only view of the page. The screen is 1920x1080 pixels; (0, 0) is the top-left corner.".to_string(),
        RESPONSE_FORMAT.to_string(),
        format!(
            "## Rules\n\
             1. Move the mouse onto an element before clicking it.\n\
             2. Use absolute pixel coordinates read from the screenshot.\n\
             3. Type one key at a time with keypress once an input is focused.\n\
             4. Scroll when the target is not on screen.\n\
             5. Call report_done with feedback as soon as the objective is achieved.\n\n{}",
            CURSOR_LEGEND
        ),
        CURSOR_INSTRUCTION.to_string(),
        STRATEGY_SHIFT.to_string(),
    ];

    if stuck >= 2 {
        let verification = match cursor {
            Some(CursorColor::Red) => VISUAL_VERIFICATION_RED,
            Some(CursorColor::NotFound) => VISUAL_VERIFICATION_HIDDEN,
            _ => VISUAL_VERIFICATION_GENERIC,
        };
        sections.push(verification.to_string());
    }
    if stuck >= 3 {
        sections.push(STUCK_GUIDANCE.to_string());
    }
    sections.push(tool_catalogue());
    sections.join("\n\n")
}

fn tool_catalogue() -> String {
    let lines: Vec<String> = crate::action::tool_declarations()
        .into_iter()
        .map(|decl| {
            let args = decl
                .parameters
                .as_ref()
                .and_then(|p| p.get("properties"))
                .and_then(|p| p.as_object())
                .map(|props| props.keys().cloned().collect::<Vec<_>>().join(", "))
                .unwrap_or_default();
            format!("- {}({}): {}", decl.name, args, decl.description)
        })
        .collect();
    format!("## Tools\n{}", lines.join("\n"))
}

/// Replay history as alternating user/model turns.
pub fn history_turns(history: &[HistoryEntry], image_turns: usize) -> Vec<PromptTurn> {
    let recent_from = history.len().saturating_sub(image_turns);
    let mut turns = Vec::with_capacity(history.len() * 2);

    for (index, entry) in history.iter().enumerate() {
        let user_parts = if index < recent_from {
            vec![PromptPart::Text(older_step_summary(entry))]
        } else if entry.has_screenshot() {
            vec![
                PromptPart::Text(HISTORY_IMAGE_CAPTION.to_string()),
                PromptPart::Image(entry.screenshot.clone()),
            ]
        } else {
            vec![PromptPart::Text(format!(
                "Previous state (the screenshot for step {} is no longer available). {}",
                index + 1,
                older_step_summary(entry)
            ))]
        };
        turns.push(PromptTurn::user(user_parts));

        let mut model_parts = Vec::with_capacity(2);
        if !entry.explanation.trim().is_empty() {
            model_parts.push(PromptPart::Text(entry.explanation.clone()));
        }
        model_parts.push(PromptPart::Call(FunctionCall::new(
            entry.tool_name(),
            serde_json::Value::Object(entry.action.args()),
        )));
        turns.push(PromptTurn::model(model_parts));
    }
    turns
}

/// Text stand-in for a step whose screenshot is not replayed.
pub fn older_step_summary(entry: &HistoryEntry) -> String {
    let outcome = match entry.changes_description.as_deref() {
        Some(changes) if !changes.trim().is_empty() => {
            format!("The observed outcome at that time was: \"{}\".", changes.trim())
        }
        _ => "No specific outcome change was recorded for that step.".to_string(),
    };
    format!(
        "Reviewing an older step: You explained: \"{}\". You then called tool: {}. {}",
        entry.explanation.trim(),
        entry.action.call_text(),
        outcome
    )
}

/// The current user turn text, in a fixed section order.
pub fn current_user_text(history: &[HistoryEntry], view: &StepView, markdown_limit: usize) -> String {
    let mut sections: Vec<String> = vec!["Here is the current screen.".to_string()];

    sections.push(recent_actions_text(history));
    if let Some(feedback) = coordinate_feedback(view.expected_cursor, view.cursor, history) {
        sections.push(feedback);
    }
    if let Some(hint) = &view.diversity_hint {
        sections.push(hint.clone());
    }
    if let (Some(last), Some(changes)) = (history.last(), view.changes.as_deref()) {
        sections.push(format!("Since you executed {}, {}", last.action.call_text(), changes));
    }

    let has_dom = !view.dom_listing.trim().is_empty();
    if has_dom {
        sections.push(format!(
            "The page contains these {} interactive elements you can target:\n{}",
            view.clickable_count, view.dom_listing
        ));
    }
    if !view.ocr_listing.trim().is_empty() {
        let intro = if has_dom {
            "Text recognised on screen, to complement the element list:"
        } else {
            "No element data is available, so here is the text recognised on screen instead:"
        };
        sections.push(format!("{}\n{}", intro, view.ocr_listing));
    }
    if let Some(markdown) = view.markdown.as_deref().filter(|m| !m.trim().is_empty()) {
        sections.push(markdown_section(markdown, markdown_limit));
    }

    if !history.is_empty() && view.screen_distance.is_some_and(|d| d < SIMILAR_SCREEN_DISTANCE) {
        sections.push(
            "This screenshot is very similar to the previous one, so your last action had little or no visible effect. Try a different approach."
                .to_string(),
        );
    }
    if let Some(feedback) = cursor_feedback(view.cursor, view.expected_cursor) {
        sections.push(feedback);
    }

    sections.push(format!(
        "What do you see, and what is the single best next action toward the objective? {}",
        COORDINATE_REMINDER
    ));
    sections.push(RESPONSE_REMINDER.to_string());

    if view.stuck_counter >= 2 {
        let mut emphasis = CURSOR_EMPHASIS.to_string();
        if let Some(cursor) = view.cursor.filter(|c| c.color.is_visible()) {
            emphasis.push_str(&format!(
                " Detected cursor: {} at {}.",
                cursor.color.as_str().to_uppercase(),
                cursor.position
            ));
        }
        sections.push(emphasis);
    }

    sections.join("\n\n")
}

fn recent_actions_text(history: &[HistoryEntry]) -> String {
    if history.is_empty() {
        return "You haven't taken any actions yet.".to_string();
    }
    let recent: Vec<String> = history
        .iter()
        .rev()
        .take(3)
        .rev()
        .map(|entry| entry.action.call_text())
        .collect();
    format!("Your last {} actions were: {}.", recent.len(), recent.join(", "))
}

/// Feedback on where the last `move_mouse` went.
pub fn coordinate_feedback(
    expected: Option<Point>,
    cursor: Option<CursorObservation>,
    history: &[HistoryEntry],
) -> Option<String> {
    let last_was_move = history.last().is_some_and(|e| e.action.target().is_some());
    let target = expected.filter(|_| last_was_move)?;

    let mut text = format!(
        "Your last mouse move was to coordinates {}. x is HORIZONTAL (0-{}) and y is VERTICAL (0-{}).",
        target, CANVAS_WIDTH, CANVAS_HEIGHT
    );
    if let Some(cursor) = cursor.filter(|c| c.color.is_visible()) {
        let drift = cursor.position.distance_to(target);
        if drift > CURSOR_DRIFT_PX {
            text.push_str(&format!(
                " The cursor was detected at {}, {:.0} pixels away from that target.",
                cursor.position, drift
            ));
        }
    }
    Some(text)
}

/// What the model should know about the cursor marker.
pub fn cursor_feedback(cursor: Option<CursorObservation>, expected: Option<Point>) -> Option<String> {
    let cursor = cursor?;
    let text = match cursor.color {
        CursorColor::NotFound => format!(
            "I cannot see a cursor dot near the expected position {}. The pointer may be hidden or the last move may not have landed where intended.",
            expected.unwrap_or(cursor.position)
        ),
        CursorColor::Unknown => format!(
            "The cursor was just repositioned to {} by coordinate correction; its colour has not been checked yet.",
            cursor.position
        ),
        color => format!(
            "I can see your cursor as a {} dot at position {}, indicating a {}.",
            color.as_str(),
            cursor.position,
            color.meaning()
        ),
    };
    Some(text)
}

fn markdown_section(markdown: &str, limit: usize) -> String {
    let body = if markdown.chars().count() > limit {
        format!("{}\n... [content truncated]", markdown.chars().take(limit).collect::<String>())
    } else {
        markdown.to_string()
    };
    format!("Text content of the page:\n```markdown\n{}\n```", body)
}

/// System and user text for the screenshot comparison call.
pub fn change_prompt(request: &ChangeRequest) -> (String, String) {
    let system = format!(
        "You compare two consecutive browser screenshots and report what changed.\n\n{}",
        CURSOR_LEGEND
    );
    let user = if request.intent.trim().is_empty() {
        format!(
            "The first image is BEFORE and the second is AFTER. Since {} was executed, describe only the visual changes between them. Mention the cursor dot colour and position if it moved. Answer in one or two sentences.",
            request.last_command
        )
    } else {
        format!(
            "The first image is BEFORE and the second is AFTER. Since {} was executed with this plan: \"{}\", compare them and answer exactly in this format:\nOBSERVED: <what visibly changed, including the cursor dot>\nINTENT ALIGNMENT: <whether the change matches the plan and counts as progress>",
            request.last_command,
            truncate_chars(request.intent.trim(), 300)
        )
    };
    (system, user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use action_locator::CommandAck;
    use perceiver_visual::ScreenshotFingerprint;

    fn entry(action: Action, explanation: &str, screenshot: Vec<u8>) -> HistoryEntry {
        HistoryEntry::new(
            action,
            CommandAck::default(),
            screenshot,
            ScreenshotFingerprint::default(),
            explanation,
            0,
        )
    }

    #[test]
    fn test_first_step_text() {
        let view = StepView {
            cursor: Some(CursorObservation::not_found(Point::canvas_center())),
            ..Default::default()
        };
        let text = current_user_text(&[], &view, 100);
        assert!(text.contains("You haven't taken any actions yet."));
        assert!(text.contains("I cannot see a cursor dot"));
        assert!(!text.contains("Since you executed"));
        assert!(!text.contains("very similar"));
    }

    #[test]
    fn test_recent_actions_and_changes() {
        let history = vec![
            entry(Action::Click, "a", vec![]),
            entry(Action::ScrollDown { ticks: 3 }, "b", vec![]),
            entry(Action::MoveMouse { x: 100, y: 200 }, "c", vec![]),
            entry(Action::MoveMouse { x: 500, y: 300 }, "d", vec![]),
        ];
        let view = StepView {
            cursor: Some(CursorObservation::new(CursorColor::Green, Point::new(540, 300))),
            expected_cursor: Some(Point::new(500, 300)),
            changes: Some("A menu opened.".into()),
            screen_distance: Some(2),
            ..Default::default()
        };
        let text = current_user_text(&history, &view, 100);
        assert!(text.contains(
            "Your last 3 actions were: scroll_wheel_down(x=3), move_mouse(x=100, y=200), move_mouse(x=500, y=300)."
        ));
        assert!(text.contains("Your last mouse move was to coordinates (500, 300)."));
        assert!(text.contains("40 pixels away"));
        assert!(text.contains("Since you executed move_mouse(x=500, y=300), A menu opened."));
        assert!(text.contains("very similar to the previous one"));
        assert!(text.contains("green dot at position (540, 300), indicating a clickable element"));
    }

    #[test]
    fn test_ocr_intro_depends_on_dom() {
        let mut view = StepView {
            ocr_listing: "TEXT BLOCKS FOUND:\n1. \"Login\" at (5, 5)".into(),
            ..Default::default()
        };
        let text = current_user_text(&[], &view, 100);
        assert!(text.contains("No element data is available"));

        view.dom_listing = "INTERACTIVE ELEMENTS ON PAGE:\n1. <button> Go at (1, 1)".into();
        view.clickable_count = 1;
        let text = current_user_text(&[], &view, 100);
        assert!(text.contains("these 1 interactive elements"));
        assert!(text.contains("to complement the element list"));
    }

    #[test]
    fn test_wants_ocr() {
        assert!(wants_ocr("", 10, 0));
        assert!(wants_ocr("listing", 2, 0));
        assert!(wants_ocr("listing", 10, 2));
        assert!(!wants_ocr("listing", 10, 1));
    }

    #[test]
    fn test_markdown_truncated() {
        let view = StepView {
            markdown: Some("x".repeat(50)),
            ..Default::default()
        };
        let text = current_user_text(&[], &view, 10);
        assert!(text.contains("```markdown\nxxxxxxxxxx\n... [content truncated]\n```"));
    }

    #[test]
    fn test_system_instruction_escalates() {
        let calm = system_instruction("buy socks", 0, None);
        assert!(calm.contains("buy socks"));
        assert!(calm.contains("- move_mouse(x, y)"));
        assert!(!calm.contains("## Visual verification"));
        assert!(!calm.contains("## You are stuck"));

        let stuck = system_instruction("buy socks", 3, Some(CursorColor::Red));
        assert!(stuck.contains("The cursor has been RED"));
        assert!(stuck.contains("scroll_wheel_down"));
        assert!(stuck.contains("## You are stuck"));
    }

    #[test]
    fn test_history_turns_split_recent_and_older() {
        let mut history: Vec<HistoryEntry> = (0..5)
            .map(|i| entry(Action::MoveMouse { x: i, y: i }, &format!("step {}", i), vec![i as u8 + 1]))
            .collect();
        history[0].changes_description = Some("Nothing happened.".into());
        history[3].screenshot = Vec::new();

        let turns = history_turns(&history, 3);
        assert_eq!(turns.len(), 10);
        assert_eq!(turns[0].role, TurnRole::User);
        assert_eq!(
            turns[0].parts,
            vec![PromptPart::Text(
                "Reviewing an older step: You explained: \"step 0\". You then called tool: move_mouse(x=0, y=0). The observed outcome at that time was: \"Nothing happened.\".".into()
            )]
        );
        assert!(matches!(&turns[2].parts[0], PromptPart::Text(t) if t.contains("No specific outcome change")));
        assert!(matches!(&turns[6].parts[0], PromptPart::Text(t) if t.starts_with("Previous state")));
        assert_eq!(turns[8].parts[1], PromptPart::Image(vec![5]));
        assert_eq!(turns[9].role, TurnRole::Model);
        assert!(matches!(&turns[9].parts[1], PromptPart::Call(call) if call.name == "move_mouse"));
    }

    #[test]
    fn test_build_prompt_attaches_screenshot() {
        let view = StepView {
            screenshot: vec![9, 9],
            stuck_counter: 2,
            cursor: Some(CursorObservation::new(CursorColor::Red, Point::new(10, 10))),
            ..Default::default()
        };
        let prompt = build_prompt("objective", &[], &view, 3, 100);
        assert_eq!(prompt.current_image(), Some(&[9u8, 9][..]));
        assert!(prompt.current_text().contains("Detected cursor: RED at (10, 10)."));
        assert!(prompt.turns.is_empty());
    }

    #[test]
    fn test_change_prompt_modes() {
        let mut request = ChangeRequest {
            before: vec![],
            after: vec![],
            last_command: "click()".into(),
            intent: "Open the pricing page".into(),
        };
        let (system, user) = change_prompt(&request);
        assert!(system.contains("GREEN"));
        assert!(user.contains("INTENT ALIGNMENT:"));

        request.intent.clear();
        let (_, user) = change_prompt(&request);
        assert!(user.contains("describe only the visual changes"));
        assert!(!user.contains("INTENT ALIGNMENT"));
    }
}
