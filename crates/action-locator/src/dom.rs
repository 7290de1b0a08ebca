//! Structural element index over DOM descriptors supplied per step.

use std::collections::HashSet;

use perceiver_visual::truncate_chars;

use crate::types::DomElement;

/// Tags that are interactive by themselves.
pub const CLICKABLE_TAGS: &[&str] = &["a", "button", "input", "select", "textarea"];

/// Attribute-name fragments marking an element as carrying a click handler.
pub const CLICK_EVENT_HINTS: &[&str] = &["click", "mousedown", "touchstart"];

/// ARIA roles treated as interactive.
pub const INTERACTIVE_ROLES: &[&str] = &[
    "button", "link", "menuitem", "tab", "checkbox", "radio", "switch", "option",
];

/// Words that mark a button as a primary action.
const ACTION_VERBS: &[&str] = &["submit", "search", "apply", "ok", "save", "next", "continue"];

/// Default number of elements rendered for the action prompt.
pub const DEFAULT_PROMPT_LIMIT: usize = 12;

/// Listing text when nothing is worth showing.
pub const NO_DOM_DATA: &str = "No DOM element data available.";

const TEXT_MAX: usize = 50;
const HREF_MAX: usize = 30;

/// Whether a single element looks clickable.
pub fn is_clickable(element: &DomElement) -> bool {
    if !element.position.is_valid() {
        return false;
    }
    let tag = element.tag();
    if CLICKABLE_TAGS.contains(&tag.as_str()) {
        let hidden = tag == "input"
            && element
                .attr("type")
                .map(|t| t.eq_ignore_ascii_case("hidden"))
                .unwrap_or(false);
        if !hidden {
            return true;
        }
    }
    let has_handler = element.attributes.iter().any(|(name, value)| {
        let name = name.to_lowercase();
        value.is_string() && CLICK_EVENT_HINTS.iter().any(|hint| name.contains(hint))
    });
    if has_handler {
        return true;
    }
    element
        .role()
        .map(|role| INTERACTIVE_ROLES.contains(&role.as_str()))
        .unwrap_or(false)
}

/// Keep only elements that are interactive, preserving discovery order.
pub fn filter_clickable(elements: &[DomElement]) -> Vec<&DomElement> {
    elements.iter().filter(|el| is_clickable(el)).collect()
}

/// Render the interactive-element listing for the action prompt.
///
/// Navigation (top band), menus (left band) and action buttons come first;
/// the remaining clickable elements follow in discovery order.
pub fn summarize_for_prompt(elements: &[DomElement], limit: usize) -> String {
    if elements.is_empty() {
        return NO_DOM_DATA.to_string();
    }
    let clickable = filter_clickable(elements);

    let mut ordered: Vec<&DomElement> = Vec::new();
    for el in &clickable {
        let tag = el.tag();
        let text = el.text.trim();
        let pos = &el.position;
        if text.is_empty() && !matches!(tag.as_str(), "input" | "button" | "select") {
            continue;
        }
        if pos.y < 150.0 {
            ordered.push(el);
        }
        if pos.x < 300.0 || (pos.y < 250.0 && matches!(tag.as_str(), "a" | "button")) {
            ordered.push(el);
        }
        let is_button = tag == "button" || el.role().as_deref() == Some("button");
        if is_button && has_action_verb(text) {
            ordered.push(el);
        }
    }
    ordered.extend(clickable.iter().copied());

    let mut seen = HashSet::new();
    let unique: Vec<&DomElement> = ordered
        .into_iter()
        .filter(|el| seen.insert(dedup_key(el)))
        .take(limit)
        .collect();

    if unique.is_empty() {
        return NO_DOM_DATA.to_string();
    }

    let mut out = String::from("INTERACTIVE ELEMENTS ON PAGE:\n");
    for (i, el) in unique.iter().enumerate() {
        let tag = el.tag();
        let text = match el.text.trim() {
            "" => "[no text]".to_string(),
            t => truncate_chars(t, TEXT_MAX),
        };
        let center = el.position.center();
        out.push_str(&format!(
            "{}. <{}{}> {} at ({}, {})\n",
            i + 1,
            tag,
            key_attribute(el, &tag),
            text,
            center.x,
            center.y
        ));
    }
    out
}

/// Compact listing used inside the correction model prompt.
pub fn describe_for_correction(elements: &[DomElement], limit: usize) -> String {
    let clickable = filter_clickable(elements);
    if clickable.is_empty() {
        return String::new();
    }
    let mut out = String::from("DOM ELEMENT MAP:\n");
    for (i, el) in clickable.into_iter().take(limit).enumerate() {
        let text = if el.text.trim().is_empty() {
            "[no text]"
        } else {
            el.text.trim()
        };
        let center = el.position.center();
        out.push_str(&format!(
            "{}. {} '{}' at ({}, {})\n",
            i + 1,
            el.tag_name,
            text,
            center.x,
            center.y
        ));
    }
    out
}

fn has_action_verb(text: &str) -> bool {
    let lower = text.to_lowercase();
    !lower.is_empty() && ACTION_VERBS.iter().any(|verb| lower.contains(verb))
}

fn dedup_key(el: &DomElement) -> String {
    format!(
        "{}|{}|{}|{}",
        el.tag_name, el.text, el.position.x, el.position.y
    )
}

fn key_attribute(el: &DomElement, tag: &str) -> String {
    if tag == "a" {
        if let Some(href) = el.attr("href") {
            return format!(" href=\"{}\"", truncate_chars(href, HREF_MAX));
        }
    }
    if let Some(placeholder) = el.attr("placeholder") {
        return format!(" placeholder=\"{}\"", placeholder);
    }
    for name in ["value", "aria-label"] {
        if let Some(value) = el.attr(name).filter(|v| !v.is_empty()) {
            return format!(" {}=\"{}\"", name, value);
        }
    }
    String::new()
}
