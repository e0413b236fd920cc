use chrono::Utc;
use satchel_core::{ExitCode, SatchelError, SatchelResult};
use satchel_store::{StoredSession, resolve_env_credentials};
use serde_json::json;

use crate::{AuthCommand, AuthContext, GlobalOptions, print_json, with_auth_context};

pub(crate) fn cmd_auth(command: AuthCommand, globals: &GlobalOptions) -> SatchelResult<ExitCode> {
    with_auth_context(globals, |ctx| match command {
        AuthCommand::Login => {
            let credentials = resolve_env_credentials(&ctx.paths.root)?.ok_or_else(|| {
                SatchelError::auth(
                    "missing credentials; set SATCHEL_EMAIL and SATCHEL_PASSWORD in environment or .env",
                )
            })?;

            let stored = login_with_email_password(&ctx, &credentials.email, &credentials.password)?;

            ctx.sessions.save(&ctx.profile, &stored)?;

            let mut state = ctx.sessions.load_app_state(&ctx.profile)?;
            state.mark_auth_ok();
            ctx.sessions.save_app_state(&ctx.profile, &state)?;

            if globals.json {
                print_json(&json!({
                    "ok": true,
                    "result": {
                        "profile": ctx.profile,
                        "server": ctx.server,
                        "email": stored.email,
                        "user_id": stored.user.id,
                    }
                }))?;
            } else {
                println!("Authenticated with {}", ctx.server);
                println!("Profile: {}", ctx.profile);
                println!("Email: {}", stored.email);
                println!("Session saved: {}", ctx.paths.state_db_path.display());
            }

            Ok(ExitCode::Success)
        }
        AuthCommand::Status => {
            let state = ctx.sessions.load_app_state(&ctx.profile)?;
            let stored = ctx.sessions.load(&ctx.profile)?;

            let Some(stored) = stored else {
                if globals.json {
                    print_json(&json!({
                        "ok": false,
                        "result": {
                            "profile": ctx.profile,
                            "server": ctx.server,
                            "authenticated": false,
                            "reason": "no stored session",
                            "last_auth_at": state.last_auth_at,
                        }
                    }))?;
                } else {
                    println!("Server: {}", ctx.server);
                    println!("Profile: {}", ctx.profile);
                    println!("Authenticated: no");
                    println!("Reason: no stored session");
                }
                return Ok(ExitCode::Auth);
            };

            if globals.json {
                print_json(&json!({
                    "ok": true,
                    "result": {
                        "profile": ctx.profile,
                        "server": ctx.server,
                        "authenticated": true,
                        "email": stored.email,
                        "user_id": stored.user.id,
                        "authenticated_at": stored.authenticated_at,
                        "last_auth_at": state.last_auth_at,
                        "last_status": state.last_status,
                    }
                }))?;
            } else {
                println!("Server: {}", ctx.server);
                println!("Profile: {}", ctx.profile);
                println!("Authenticated: yes");
                println!("Email: {}", stored.email);
                println!("Authenticated at: {}", stored.authenticated_at);
            }

            Ok(ExitCode::Success)
        }
        AuthCommand::Logout => {
            let mut remote_sign_out = false;
            let mut remote_warning = None;
            if let Some(stored) = ctx.sessions.load(&ctx.profile)? {
                match ctx.api.sign_out(&stored.token) {
                    Ok(()) => {
                        remote_sign_out = true;
                    }
                    Err(err) => {
                        remote_warning = Some(err.message);
                    }
                }
            }

            ctx.sessions.remove(&ctx.profile)?;
            // Cached collections belong to the departing user.
            ctx.sessions.clear_all_snapshots(&ctx.profile)?;

            let mut state = ctx.sessions.load_app_state(&ctx.profile)?;
            state.last_auth_at = None;
            state.last_status = Some("logged out".to_string());
            ctx.sessions.save_app_state(&ctx.profile, &state)?;

            if globals.json {
                print_json(&json!({
                    "ok": true,
                    "result": {
                        "profile": ctx.profile,
                        "server": ctx.server,
                        "remote_sign_out": remote_sign_out,
                        "warning": remote_warning,
                    }
                }))?;
            } else {
                println!("Local session removed for profile '{}'.", ctx.profile);
                if remote_sign_out {
                    println!("Server session invalidated.");
                } else if let Some(warning) = remote_warning {
                    println!("Server sign-out warning: {warning}");
                }
            }

            Ok(ExitCode::Success)
        }
    })
}

fn login_with_email_password(
    ctx: &AuthContext,
    email: &str,
    password: &str,
) -> SatchelResult<StoredSession> {
    let email = email.trim().to_lowercase();
    let sign_in = ctx.api.sign_in(&email, password)?;

    let token = sign_in
        .token
        .ok_or_else(|| SatchelError::auth("login response did not include a session token"))?;
    let user = sign_in.user.ok_or_else(|| {
        SatchelError::auth("login response did not include the user record")
    })?;

    Ok(StoredSession {
        profile: ctx.profile.clone(),
        server: ctx.server.clone(),
        email,
        authenticated_at: Utc::now().to_rfc3339(),
        token,
        user,
    })
}
