use clap::{Parser, Subcommand};

/// `StrideSync` - onboarding questionnaire with autosave and session sync.
#[derive(Parser, Debug)]
#[command(name = "stridesync")]
#[command(author = "theonlyhennygod")]
#[command(version = "0.1.0")]
#[command(about = "Fill in the running questionnaire and keep it synced.", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the draft, session and sign-in state
    Status,

    /// Set one questionnaire field and autosave
    Set {
        /// Field name, e.g. email, goal, race_distance, training_days
        field: String,

        /// New value; "" or "-" clears it. Lists are comma separated,
        /// recent runs are `km@minutes`
        value: String,
    },

    /// Move through the questionnaire
    Step {
        /// `next`, `prev`, or a step name such as `race_details`
        target: String,
    },

    /// Push pending changes now instead of waiting for the quiet period
    Flush,

    /// Submit the finished questionnaire
    Submit,

    /// Store tokens from a completed sign-in and attach the anonymous session
    Login {
        #[arg(long)]
        access_token: String,

        #[arg(long)]
        refresh_token: String,
    },

    /// Attach the stored anonymous session to the signed-in account
    Attach,

    /// Forget stored tokens
    Logout,

    /// Discard the local draft and anonymous session
    Reset,
}
