//! User-facing replies and keyboards.

use crate::domain::{
    AuthoringState, ButtonAction, Draft, Group, MediaKind, Publication, ScheduledPublication,
    TimeParseError,
};
use crate::ports::InlineButton;
use crate::usecases::{DispatchReport, Stats};

pub const HELP: &str = "👋 Scheduled broadcast bot.\n\n\
Commands:\n\
/admin - admin panel\n\
/addgroup [handle] [label] - register a group (defaults to this chat)\n\
/removegroup [handle] - unregister a group\n\
/groups - list registered groups\n\
/schedule - create a scheduled publication\n\
/publish <text> - send a message to all groups now\n\
/done - finish the current draft\n\
/cancel - abandon the current draft";

pub const ACCESS_DENIED: &str = "❌ Access reserved to administrators.";
pub const GENERIC_ERROR: &str = "⚠️ Something went wrong. Please try again.";
pub const CANCELLED: &str = "❌ Action cancelled.";
pub const NO_DRAFT: &str = "No draft in progress. Use /schedule to start one.";
pub const NO_PUBLICATIONS: &str = "No scheduled publications.";
pub const NO_GROUPS: &str = "No groups registered.";
pub const ADMIN_PANEL: &str = "🔧 Admin panel";
pub const ASK_BODY: &str = "📝 Send the text of the publication.";
pub const ASK_TIME: &str = "⏰ At what time should it be sent every day? (HH:MM, e.g. 14:30)";
pub const MEDIA_PROMPT: &str = "📎 Send photos or videos now. Press Finish when done.";
pub const PUBLISH_USAGE: &str = "Usage: /publish <message>";
pub const UNKNOWN_ACTION: &str = "Unknown action.";

const PREVIEW_CHARS: usize = 50;

/// First `max` characters of `text`, with "..." appended when cut.
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn status(active: bool) -> &'static str {
    if active { "✅ Active" } else { "⏸ Inactive" }
}

pub fn admin_panel() -> Vec<Vec<InlineButton>> {
    vec![
        vec![InlineButton::new("📋 List publications", ButtonAction::ListPublications)],
        vec![InlineButton::new("➕ Add publication", ButtonAction::AddPublication)],
        vec![InlineButton::new("✏️ Edit publication", ButtonAction::EditMenu)],
        vec![InlineButton::new("🗑 Delete publication", ButtonAction::DeleteMenu)],
        vec![InlineButton::new("⏯ Activate / pause", ButtonAction::ToggleMenu)],
        vec![InlineButton::new("📊 Statistics", ButtonAction::Stats)],
    ]
}

pub fn recap_buttons() -> Vec<Vec<InlineButton>> {
    vec![
        vec![InlineButton::new("📎 Add photo/video", ButtonAction::AddMedia)],
        vec![
            InlineButton::new("✅ Finish", ButtonAction::Finish),
            InlineButton::new("❌ Cancel", ButtonAction::Cancel),
        ],
    ]
}

/// One button per publication, built with `action`.
pub fn publication_buttons(
    list: &[ScheduledPublication],
    action: fn(crate::domain::PublicationId) -> ButtonAction,
) -> Vec<Vec<InlineButton>> {
    list.iter()
        .map(|s| {
            let p = &s.publication;
            vec![InlineButton::new(
                format!("{} - {}", p.time, truncate(&p.content.body, 30)),
                action(p.id.clone()),
            )]
        })
        .collect()
}

pub fn publication_list(list: &[ScheduledPublication]) -> String {
    if list.is_empty() {
        return NO_PUBLICATIONS.to_string();
    }
    let mut out = String::from("📋 Scheduled publications:\n");
    for (i, s) in list.iter().enumerate() {
        let p = &s.publication;
        out.push_str(&format!(
            "\n{}. ⏰ {}\n📝 {}\n📎 {} media\n{}\n",
            i + 1,
            p.time,
            truncate(&p.content.body, PREVIEW_CHARS),
            p.content.media.len(),
            status(s.schedule.active)
        ));
    }
    out
}

pub fn group_list(groups: &[Group]) -> String {
    if groups.is_empty() {
        return NO_GROUPS.to_string();
    }
    let mut out = String::from("👥 Registered groups:\n");
    for g in groups {
        if g.label == g.handle {
            out.push_str(&format!("\n• {}", g.handle));
        } else {
            out.push_str(&format!("\n• {} ({})", g.label, g.handle));
        }
    }
    out
}

pub fn recap(draft: &Draft) -> String {
    let time = draft.time.map(|t| t.to_string()).unwrap_or_else(|| "--:--".into());
    format!(
        "📋 Summary:\n\n⏰ Time: {}\n📝 Message: {}\n📎 Media: {}\n\nAdd media, finish or cancel.",
        time,
        draft.body.as_deref().unwrap_or_default(),
        draft.media.len()
    )
}

pub fn media_added(kind: MediaKind, count: usize) -> String {
    let what = match kind {
        MediaKind::Photo => "Photo",
        MediaKind::Video => "Video",
    };
    format!(
        "✅ {} added ({} attached). Send more or press Finish.",
        what, count
    )
}

pub fn invalid_time(e: &TimeParseError) -> String {
    format!("Invalid time format ({}). Use HH:MM. Try again:", e)
}

pub fn unexpected(state: AuthoringState) -> String {
    match state {
        AuthoringState::AwaitingText => "Please send the publication text first.".into(),
        AuthoringState::AwaitingTime => "Please send a time as HH:MM.".into(),
        AuthoringState::AwaitingMediaOrFinish => {
            "Send a photo or video, or press Finish (/done) or Cancel (/cancel).".into()
        }
    }
}

pub fn committed(p: &Publication, edited: bool) -> String {
    let verb = if edited { "updated" } else { "scheduled" };
    format!(
        "✅ Publication {} {}!\n\n⏰ Every day at {}\n📝 {}\n📎 {} media",
        p.id,
        verb,
        p.time,
        truncate(&p.content.body, PREVIEW_CHARS),
        p.content.media.len()
    )
}

pub fn published_now(body: &str, report: &DispatchReport) -> String {
    let mut out = format!(
        "✅ Sent immediately: {} delivered, {} failed.\n\nMessage: {}",
        report.delivered(),
        report.failed(),
        body
    );
    for failed in report
        .outcomes
        .iter()
        .filter(|o| o.status != crate::usecases::DeliveryStatus::Delivered)
    {
        out.push_str(&format!("\n⚠️ {} not reached", failed.group.label));
    }
    out
}

pub fn stats(s: &Stats) -> String {
    let mut out = format!(
        "📊 Statistics\n\n👥 Groups: {}\n📋 Publications: {}\n✅ Active: {}\n",
        s.groups, s.publications, s.active
    );
    for f in &s.last_fires {
        let when = f
            .when
            .map(|w| w.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".into());
        match f.result {
            Some(r) => out.push_str(&format!(
                "\n{}: last sent {} ({} delivered, {} failed)",
                f.id, when, r.delivered, r.failed
            )),
            None => out.push_str(&format!("\n{}: last sent {}", f.id, when)),
        }
    }
    out
}
