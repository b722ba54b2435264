//! Line-based screens for each step of the reset.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

use recover_engine::{
    CODE_LENGTH, CellEdit, CountdownEvent, FlowController, FlowError, NavParams, Navigator,
    PARAM_EMAIL, Route, Stage,
};

/// Screen requested by the navigation bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    ForgotPassword,
    VerifyCode { email: String },
    NewPassword,
    ResetComplete,
}

impl Screen {
    fn from_route(route: Route, params: Option<&NavParams>) -> Self {
        match route {
            Route::ForgotPassword => Self::ForgotPassword,
            Route::VerifyCode => Self::VerifyCode {
                email: params
                    .and_then(|p| p.get(PARAM_EMAIL))
                    .cloned()
                    .unwrap_or_default(),
            },
            Route::NewPassword => Self::NewPassword,
            Route::ResetComplete => Self::ResetComplete,
        }
    }
}

/// Navigator that hands screen requests to the screen loop.
///
/// A terminal has no back stack, so popping reduces to a plain switch.
pub struct ChannelNavigator {
    tx: mpsc::UnboundedSender<Screen>,
}

impl ChannelNavigator {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Screen>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, screen: Screen) {
        if self.tx.send(screen).is_err() {
            tracing::debug!("Screen loop gone; dropping navigation");
        }
    }
}

impl Navigator for ChannelNavigator {
    fn navigate_to(&self, route: Route, params: &NavParams) {
        self.send(Screen::from_route(route, Some(params)));
    }

    fn pop_and_navigate_to(&self, route: Route, clear_back_stack_to: Route) {
        tracing::debug!(%route, %clear_back_stack_to, "Clearing back stack");
        self.send(Screen::from_route(route, None));
    }
}

enum Step {
    /// The flow advanced; the next screen comes from the bridge.
    Advanced,
    Quit,
}

struct Prompt {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompt {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Show `label` and read one line. `None` on end of input.
    async fn ask(&mut self, label: &str) -> Result<Option<String>> {
        show(label)?;
        self.next_line().await
    }

    async fn next_line(&mut self) -> Result<Option<String>> {
        self.lines
            .next_line()
            .await
            .context("Failed to read from stdin")
    }
}

fn show(label: &str) -> Result<()> {
    let mut out = std::io::stdout().lock();
    write!(out, "{label}")?;
    out.flush()?;
    Ok(())
}

/// Print what went wrong, then clear the flow's error slot.
fn report(flow: &FlowController, err: &FlowError) {
    if err.is_silent() {
        return;
    }
    let message = flow
        .state()
        .error_message()
        .map_or_else(|| err.to_string(), str::to_string);
    println!("  {message}");
    flow.acknowledge_error();
}

pub async fn run(
    flow: &Arc<FlowController>,
    mut navigation: mpsc::UnboundedReceiver<Screen>,
) -> Result<()> {
    let mut prompt = Prompt::new();
    let mut screen = Screen::ForgotPassword;

    loop {
        tracing::debug!(?screen, "Showing screen");
        let step = match &screen {
            Screen::ForgotPassword => forgot_password(flow, &mut prompt).await?,
            Screen::VerifyCode { email } => verify_code(flow, &mut prompt, email).await?,
            Screen::NewPassword => new_password(flow, &mut prompt).await?,
            Screen::ResetComplete => {
                println!("Your password has been reset. You can sign in with it now.");
                return Ok(());
            }
        };

        match step {
            Step::Quit => return Ok(()),
            Step::Advanced => {
                screen = navigation
                    .recv()
                    .await
                    .context("Navigation stopped unexpectedly")?;
            }
        }
    }
}

async fn forgot_password(flow: &FlowController, prompt: &mut Prompt) -> Result<Step> {
    println!("Reset your password");
    loop {
        let Some(email) = prompt.ask("Email address: ").await? else {
            return Ok(Step::Quit);
        };
        match flow.request_code(&email).await {
            Ok(()) => return Ok(Step::Advanced),
            Err(err) => report(flow, &err),
        }
    }
}

async fn verify_code(
    flow: &Arc<FlowController>,
    prompt: &mut Prompt,
    email: &str,
) -> Result<Step> {
    let _screen = flow.enter_verification();
    let mut countdown = flow.countdown_events();
    let mut countdown_open = true;

    println!("We sent a {CODE_LENGTH}-digit code to {email}.");
    println!("Type the code, 'r' to send a new one, or 'q' to quit.");

    let mut prompt_shown = false;
    loop {
        if !prompt_shown {
            show("Code: ")?;
            prompt_shown = true;
        }
        tokio::select! {
            line = prompt.next_line() => {
                prompt_shown = false;
                let Some(line) = line? else {
                    return Ok(Step::Quit);
                };
                match line.trim() {
                    "q" => return Ok(Step::Quit),
                    "r" => match flow.resend().await {
                        Ok(()) => println!("  A new code is on its way."),
                        Err(err) => report(flow, &err),
                    },
                    code => {
                        if flow.paste_code(code) == CellEdit::Rejected {
                            println!("  Enter all {CODE_LENGTH} digits of the code.");
                            continue;
                        }
                        match flow.verify_code().await {
                            Ok(()) => return Ok(Step::Advanced),
                            Err(err) => report(flow, &err),
                        }
                    }
                }
            }
            event = countdown.recv(), if countdown_open => match event {
                Ok(CountdownEvent::Expired) => {
                    println!();
                    println!("  Didn't get it? Type 'r' to send a new code.");
                    prompt_shown = false;
                }
                Ok(CountdownEvent::Tick { .. }) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => countdown_open = false,
            },
        }
    }
}

async fn new_password(flow: &FlowController, prompt: &mut Prompt) -> Result<Step> {
    let min_len = flow.settings().min_password_len;
    println!("Choose a new password (at least {min_len} characters).");

    loop {
        let Some(password) = prompt.ask("New password: ").await? else {
            return Ok(Step::Quit);
        };
        let Some(confirm) = prompt.ask("Repeat password: ").await? else {
            return Ok(Step::Quit);
        };
        if password != confirm {
            println!("  The passwords do not match.");
            continue;
        }

        match flow.set_new_password(&password).await {
            Ok(()) => return Ok(Step::Advanced),
            Err(err) => {
                report(flow, &err);
                if flow.state().stage() == Stage::Failed {
                    return start_over(flow, prompt).await;
                }
            }
        }
    }
}

/// The verified session expired; offer a fresh code to the same address.
async fn start_over(flow: &FlowController, prompt: &mut Prompt) -> Result<Step> {
    loop {
        let Some(answer) = prompt.ask("Send a new code? [Y/n] ").await? else {
            return Ok(Step::Quit);
        };
        if answer.trim().eq_ignore_ascii_case("n") {
            return Ok(Step::Quit);
        }
        match flow.resend().await {
            Ok(()) => return Ok(Step::Advanced),
            Err(err) => report(flow, &err),
        }
    }
}
