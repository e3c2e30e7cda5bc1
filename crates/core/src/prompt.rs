//! Prompt composition for generation units.
//!
//! Templates are opaque text supplied by the prompt store. These helpers
//! only append the unit's own content after the template; placeholder
//! substitution inside templates is handled elsewhere.

use crate::media::{is_video_link, MediaKind};
use crate::shot::ShotUnit;

/// Suffix appended to character video prompts.
const VIDEO_MOTION_SUFFIX: &str = "smooth motion, cinematic";

/// Compose the prompt for one shot group.
///
/// Each member shot contributes a line with its duration, camera, mood and
/// description, followed by its dialogue lines.
pub fn compose_shot_prompt(
    template: &str,
    shots: &[ShotUnit],
    target_duration_secs: f64,
    feature_prefix: Option<&str>,
) -> String {
    let mut body = String::new();
    body.push_str(template.trim());
    body.push_str(&format!(
        "\n\nTotal duration: {}s",
        format_secs(target_duration_secs)
    ));

    for (index, shot) in shots.iter().enumerate() {
        body.push_str(&format!(
            "\nShot {} ({}s)",
            index + 1,
            format_secs(shot.effective_duration())
        ));
        if let Some(camera) = non_empty(shot.camera.as_deref()) {
            body.push_str(&format!(" [camera: {camera}]"));
        }
        if let Some(mood) = non_empty(shot.mood.as_deref()) {
            body.push_str(&format!(" [mood: {mood}]"));
        }
        if let Some(description) = non_empty(shot.description.as_deref()) {
            body.push_str(&format!(": {description}"));
        }
        for line in &shot.dialogue {
            match non_empty(line.speaker.as_deref()) {
                Some(speaker) => body.push_str(&format!("\n  {speaker}: \"{}\"", line.text)),
                None => body.push_str(&format!("\n  \"{}\"", line.text)),
            }
        }
    }

    with_prefix(feature_prefix, body)
}

/// Compose the prompt for a character portrait (image) or motion clip (video).
pub fn compose_character_prompt(
    template: &str,
    name: &str,
    appearance: Option<&str>,
    description: Option<&str>,
    kind: MediaKind,
    feature_prefix: Option<&str>,
) -> String {
    let mut parts = vec![format!("Character: {name}")];
    if let Some(appearance) = non_empty(appearance) {
        parts.push(format!("Appearance: {appearance}"));
    }
    if let Some(description) = non_empty(description) {
        parts.push(format!("Description: {description}"));
    }
    if kind == MediaKind::Video {
        parts.push(VIDEO_MOTION_SUFFIX.to_string());
    }

    let body = if template.trim().is_empty() {
        parts.join(". ")
    } else {
        format!("{}\n\n{}", template.trim(), parts.join(". "))
    };
    with_prefix(feature_prefix, body)
}

/// Keep only reference links that point at video files.
pub fn video_reference_links<S: AsRef<str>>(links: &[S]) -> Vec<String> {
    links
        .iter()
        .map(AsRef::as_ref)
        .filter(|l| !l.is_empty() && is_video_link(l))
        .map(str::to_string)
        .collect()
}

fn with_prefix(prefix: Option<&str>, body: String) -> String {
    match non_empty(prefix) {
        Some(prefix) => format!("{}\n\n{body}", prefix.trim()),
        None => body,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Render seconds without a trailing `.0` for whole numbers.
fn format_secs(secs: f64) -> String {
    if secs.fract() == 0.0 {
        format!("{secs:.0}")
    } else {
        format!("{secs:.1}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shot::DialogueLine;

    fn shot(id: i64, duration: f64, description: &str) -> ShotUnit {
        ShotUnit {
            id,
            project_id: 1,
            scene_id: Some(1),
            order: Some(id as i32),
            shot_number: None,
            duration_secs: Some(duration),
            description: Some(description.into()),
            camera: None,
            mood: None,
            dialogue: Vec::new(),
            characters: Vec::new(),
            existing_video_url: None,
        }
    }

    #[test]
    fn shot_prompt_lists_every_member_in_order() {
        let mut first = shot(1, 3.0, "Rain on the window");
        first.camera = Some("close-up".into());
        first.dialogue.push(DialogueLine {
            speaker: Some("Mei".into()),
            text: "It's late.".into(),
        });
        let second = shot(2, 4.5, "She opens the door");

        let prompt = compose_shot_prompt("STYLE", &[first, second], 7.5, None);

        assert!(prompt.starts_with("STYLE"));
        assert!(prompt.contains("Total duration: 7.5s"));
        assert!(prompt.contains("Shot 1 (3s) [camera: close-up]: Rain on the window"));
        assert!(prompt.contains("  Mei: \"It's late.\""));
        assert!(prompt.contains("Shot 2 (4.5s): She opens the door"));
        let first_pos = prompt.find("Shot 1").unwrap();
        let second_pos = prompt.find("Shot 2").unwrap();
        assert!(first_pos < second_pos);
    }

    #[test]
    fn feature_prefix_comes_first() {
        let prompt = compose_shot_prompt("T", &[shot(1, 3.0, "x")], 3.0, Some("Anime style"));
        assert!(prompt.starts_with("Anime style\n\nT"));
    }

    #[test]
    fn blank_feature_prefix_is_ignored() {
        let prompt = compose_shot_prompt("T", &[shot(1, 3.0, "x")], 3.0, Some("   "));
        assert!(prompt.starts_with('T'));
    }

    #[test]
    fn character_video_prompt_adds_motion_suffix() {
        let prompt =
            compose_character_prompt("", "Jun", Some("tall"), None, MediaKind::Video, None);
        assert_eq!(prompt, "Character: Jun. Appearance: tall. smooth motion, cinematic");
    }

    #[test]
    fn character_image_prompt_has_no_motion_suffix() {
        let prompt = compose_character_prompt("T", "Jun", None, None, MediaKind::Image, None);
        assert_eq!(prompt, "T\n\nCharacter: Jun");
    }

    #[test]
    fn reference_links_keep_only_video_files() {
        let links = ["https://a/x.mp4", "https://a/y.png", "", "https://a/z.mov"];
        assert_eq!(
            video_reference_links(&links),
            vec!["https://a/x.mp4".to_string(), "https://a/z.mov".to_string()]
        );
    }
}
