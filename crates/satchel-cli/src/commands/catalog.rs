use satchel_collections::hydrate_one;
use satchel_core::{ExitCode, SatchelError, SatchelResult};
use serde_json::json;

use crate::{CatalogCommand, GlobalOptions, print_json, with_auth_context};

pub(crate) fn cmd_catalog(
    command: CatalogCommand,
    globals: &GlobalOptions,
) -> SatchelResult<ExitCode> {
    with_auth_context(globals, |ctx| match command {
        CatalogCommand::Show { course_id } => {
            let detail = hydrate_one(&ctx.api, &course_id).ok_or_else(|| {
                SatchelError::api(format!("no catalog record found for course '{course_id}'"))
            })?;

            if globals.json {
                print_json(&json!({"ok": true, "result": detail}))?;
            } else {
                println!("Course: {} ({})", detail.title, detail.id);
                if let Some(instructor) = &detail.instructor {
                    println!("Instructor: {instructor}");
                }
                if let Some(price) = detail.price {
                    println!("Price: ${price:.2}");
                }
                if let Some(rating) = detail.rating {
                    println!("Rating: {rating:.1}");
                }
                if let Some(category) = &detail.category {
                    println!("Category: {category}");
                }
            }

            Ok(ExitCode::Success)
        }
    })
}
