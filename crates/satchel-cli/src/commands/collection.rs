use satchel_api::CollectionKind;
use satchel_collections::{CollectionState, CollectionStore};
use satchel_core::{ExitCode, SatchelError, SatchelResult};
use serde_json::json;

use crate::{AuthContext, CollectionCommand, GlobalOptions, print_json, with_auth_context};

pub(crate) fn cmd_collection(
    kind: CollectionKind,
    command: CollectionCommand,
    globals: &GlobalOptions,
) -> SatchelResult<ExitCode> {
    with_auth_context(globals, |ctx| {
        let mut store = CollectionStore::new(&ctx.api, &ctx.sessions, &ctx.profile, kind);

        match command {
            CollectionCommand::List { cached } => {
                if cached {
                    store.load_cached();
                    render_listing(&ctx, kind, store.state(), globals, true)?;
                    return Ok(ExitCode::Success);
                }

                store.fetch_collection();
                finish_fetch(&ctx, &store)?;
                render_listing(&ctx, kind, store.state(), globals, false)?;
                Ok(ExitCode::Success)
            }
            CollectionCommand::Toggle { course_id } => {
                store.toggle(&course_id);
                finish_mutation(&ctx, &store)?;

                let member = store.state().contains(&course_id);
                if globals.json {
                    print_json(&json!({
                        "ok": true,
                        "result": {
                            "collection": kind.to_string(),
                            "course_id": course_id,
                            "member": member,
                        }
                    }))?;
                } else if member {
                    println!("Course {course_id} added to {kind}.");
                } else {
                    println!("Course {course_id} removed from {kind}.");
                }

                Ok(ExitCode::Success)
            }
            CollectionCommand::Remove { course_id } => {
                store.remove(&course_id);
                finish_mutation(&ctx, &store)?;

                if globals.json {
                    print_json(&json!({
                        "ok": true,
                        "result": {
                            "collection": kind.to_string(),
                            "course_id": course_id,
                            "member": false,
                        }
                    }))?;
                } else {
                    println!("Course {course_id} removed from {kind}.");
                }

                Ok(ExitCode::Success)
            }
            CollectionCommand::Clear => {
                if !globals.yes {
                    return Err(SatchelError::usage(format!(
                        "refusing to clear {kind} without --yes"
                    )));
                }

                store.clear();
                finish_mutation(&ctx, &store)?;

                if globals.json {
                    print_json(&json!({
                        "ok": true,
                        "result": {
                            "collection": kind.to_string(),
                            "cleared": true,
                        }
                    }))?;
                } else {
                    println!("Collection {kind} cleared.");
                }

                Ok(ExitCode::Success)
            }
            CollectionCommand::Notify { course_id } => {
                store.toggle_notification(&course_id);
                finish_mutation(&ctx, &store)?;

                let enabled = store
                    .state()
                    .entry_for(&course_id)
                    .and_then(|entry| entry.notifications_enabled);

                if globals.json {
                    print_json(&json!({
                        "ok": true,
                        "result": {
                            "collection": kind.to_string(),
                            "course_id": course_id,
                            "notifications_enabled": enabled,
                        }
                    }))?;
                } else {
                    match enabled {
                        Some(true) => println!("Notifications enabled for course {course_id}."),
                        Some(false) => println!("Notifications disabled for course {course_id}."),
                        None => println!(
                            "Notification toggle sent for course {course_id}; the server did not report the new value."
                        ),
                    }
                }

                Ok(ExitCode::Success)
            }
        }
    })
}

/// Surfaces a failed fetch as a command error, after recording it. The store
/// itself never errors; its `state.error` is the only signal.
fn finish_fetch(ctx: &AuthContext, store: &CollectionStore<'_>) -> SatchelResult<()> {
    let mut app_state = ctx.sessions.load_app_state(&ctx.profile)?;
    match &store.state().error {
        Some(message) => {
            app_state.mark_error(message);
            ctx.sessions.save_app_state(&ctx.profile, &app_state)?;
            Err(SatchelError::api(message.clone()))
        }
        None => {
            app_state.mark_fetch_ok();
            ctx.sessions.save_app_state(&ctx.profile, &app_state)
        }
    }
}

fn finish_mutation(ctx: &AuthContext, store: &CollectionStore<'_>) -> SatchelResult<()> {
    let mut app_state = ctx.sessions.load_app_state(&ctx.profile)?;
    match &store.state().error {
        Some(message) => {
            app_state.mark_error(message);
            ctx.sessions.save_app_state(&ctx.profile, &app_state)?;
            Err(SatchelError::api(message.clone()))
        }
        None => {
            app_state.mark_mutation_ok();
            ctx.sessions.save_app_state(&ctx.profile, &app_state)
        }
    }
}

fn render_listing(
    ctx: &AuthContext,
    kind: CollectionKind,
    state: &CollectionState,
    globals: &GlobalOptions,
    cached: bool,
) -> SatchelResult<()> {
    let signed_in = ctx.sessions.current_user(&ctx.profile)?.is_some();

    if globals.json {
        return print_json(&json!({
            "ok": state.error.is_none(),
            "result": {
                "collection": kind.to_string(),
                "signed_in": signed_in,
                "cached": cached,
                "count": state.ids.len(),
                "ids": state.ids,
                "items": state.items,
                "entries": state.entries,
                "error": state.error,
            }
        }));
    }

    println!("Collection: {kind}{}", if cached { " (cached)" } else { "" });
    if !signed_in {
        println!("(not signed in; showing an empty collection)");
    }
    println!("Courses: {}", state.ids.len());

    for id in &state.ids {
        match state.detail_for(id) {
            Some(detail) => {
                let mut line = format!("  - {id}  {}", detail.title);
                if let Some(price) = detail.price {
                    line.push_str(&format!("  (${price:.2})"));
                }
                if let Some(instructor) = &detail.instructor {
                    line.push_str(&format!("  by {instructor}"));
                }
                println!("{line}");
            }
            None => println!("  - {id}  (details unavailable)"),
        }
    }

    Ok(())
}
