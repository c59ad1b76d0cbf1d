use crate::config::Config;
use crate::error::StoreError;
use crate::form::FormStateMachine;
use crate::store::{LocalStore, keys};

pub fn render_status(
    config: &Config,
    store: &dyn LocalStore,
    signed_in: bool,
    form: &FormStateMachine,
) -> Result<String, StoreError> {
    let session = store.get(keys::SESSION_ID)?;
    let pending_attach = store.flag(keys::PENDING_ATTACH)?;
    let has_draft = store.get(keys::DRAFT)?.is_some();

    let mut lines = vec![
        format!("◆ StrideSync {}", env!("CARGO_PKG_VERSION")),
        String::new(),
        format!("  Config       {}", config.config_path.display()),
        format!("  State        {}", config.state_path().display()),
        format!("  API          {}", config.api.base_url),
        format!("  Quiet period {} ms", config.autosave.debounce_ms),
        String::new(),
        format!("  Signed in    {}", yes_no(signed_in)),
        format!(
            "  Session      {}",
            session.as_deref().unwrap_or("(none)")
        ),
        format!("  Attach due   {}", yes_no(pending_attach)),
        format!("  Draft saved  {}", yes_no(has_draft)),
        String::new(),
        format!("  Step         {}", form.current_step()),
    ];

    for step in form.reachable_steps() {
        let marker = if step == form.current_step() { ">" } else { " " };
        let mark = if form.is_step_valid(step) { "✓" } else { "·" };
        lines.push(format!("   {marker} {mark} {step}"));
    }
    lines.push(format!("  Complete     {}", yes_no(form.is_complete())));

    Ok(lines.join("\n"))
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
