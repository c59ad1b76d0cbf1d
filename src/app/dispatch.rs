use anyhow::{Context, Result, anyhow, bail};
use std::str::FromStr;
use tracing::info;

use crate::app::runtime::SyncRuntime;
use crate::app::status::render_status;
use crate::auth::TokenPair;
use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::form::{FieldKey, FieldValue, FormStateMachine, StepId};

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    let runtime = SyncRuntime::open(&config).context("Failed to open local state")?;
    let outcome = run_command(cli.command, &config, &runtime).await;
    runtime.shutdown().await;
    outcome
}

async fn run_command(command: Commands, config: &Config, runtime: &SyncRuntime) -> Result<()> {
    match command {
        Commands::Status => {
            let form = runtime.restore_form();
            let status = render_status(
                config,
                runtime.store().as_ref(),
                runtime.gate().is_signed_in(),
                &form,
            )?;
            println!("{status}");
            Ok(())
        }

        Commands::Set { field, value } => {
            let key = parse_field(&field)?;
            let parsed = FieldValue::parse_for(key, &value)?;

            let mut form = runtime.restore_form();
            let result = form.set_field(key, parsed);
            if !result.applied {
                bail!("{key} does not accept {value:?} on the current path");
            }
            runtime.autosave().record_change(form.state());

            println!(
                "{key} updated; step {} is {}",
                result.step,
                if result.step_valid { "valid" } else { "incomplete" }
            );
            for cleared in &result.cleared {
                println!("  cleared {cleared}");
            }
            Ok(())
        }

        Commands::Step { target } => {
            let mut form = runtime.restore_form();
            let moved = move_to(&mut form, &target)?;
            runtime.autosave().record_change(form.state());
            println!("now on {moved}");
            Ok(())
        }

        Commands::Flush => {
            let form = runtime.restore_form();
            runtime.autosave().record_change(form.state());
            if runtime.autosave().flush_now().await {
                println!("changes pushed");
            } else {
                println!("nothing pushed; draft kept locally");
            }
            Ok(())
        }

        Commands::Submit => {
            let form = runtime.restore_form();
            if !form.is_complete() {
                let missing: Vec<String> = form
                    .reachable_steps()
                    .into_iter()
                    .filter(|s| !form.is_step_valid(*s))
                    .map(|s| s.to_string())
                    .collect();
                bail!("Questionnaire incomplete: {}", missing.join(", "));
            }
            let ack = runtime
                .autosave()
                .submit(form.state())
                .await
                .context("Submission failed")?;
            println!("submitted session {}", ack.session_id);
            Ok(())
        }

        Commands::Login {
            access_token,
            refresh_token,
        } => {
            let outcome = runtime
                .on_authenticated(TokenPair::new(access_token, refresh_token))
                .await
                .context("Signed in, but the questionnaire could not be attached")?;
            match outcome {
                Some(outcome) => println!(
                    "signed in; questionnaire attached (completed: {})",
                    outcome.questionnaire_completed
                ),
                None => println!("signed in"),
            }
            Ok(())
        }

        Commands::Attach => {
            if !runtime.gate().is_signed_in() {
                bail!("Sign in first: stridesync login --access-token ... --refresh-token ...");
            }
            let attached = runtime
                .attach()
                .attach_if_pending()
                .await
                .context("Attach failed")?;
            println!(
                "{}",
                if attached {
                    "session attached"
                } else {
                    "no session to attach"
                }
            );
            Ok(())
        }

        Commands::Logout => {
            runtime.logout()?;
            println!("signed out");
            Ok(())
        }

        Commands::Reset => {
            runtime.reset_local()?;
            info!("local draft discarded");
            println!("draft and anonymous session discarded");
            Ok(())
        }
    }
}

fn parse_field(name: &str) -> Result<FieldKey> {
    FieldKey::from_str(name).map_err(|_| anyhow!("Unknown field {name:?}"))
}

fn move_to(form: &mut FormStateMachine, target: &str) -> Result<StepId> {
    match target {
        "next" => form
            .next()
            .context("Already on the last step"),
        "prev" | "back" => form
            .prev()
            .context("Already on the first step"),
        name => {
            let step = StepId::from_str(name).map_err(|_| anyhow!("Unknown step {name:?}"))?;
            if !form.go_to_step(step) {
                bail!("{step} is not on the path for the current answers");
            }
            Ok(step)
        }
    }
}
