use anyhow::{Context, Result, anyhow};
use spendlens_application::ClientContext;
use spendlens_core::account::RegistrationForm;
use spendlens_core::session::SessionStatus;

pub async fn login(ctx: &ClientContext, username: &str, password: &str) -> Result<()> {
    let status = ctx
        .auth
        .login(username, password)
        .await
        .map_err(|e| anyhow!(e.user_message()))?;
    print_status(&status);
    Ok(())
}

pub fn logout(ctx: &ClientContext) -> Result<()> {
    let transitioned = ctx
        .auth
        .logout()
        .context("Logged out, but the stored credentials could not be removed")?;
    if transitioned {
        println!("Logged out");
    } else {
        println!("Not logged in");
    }
    Ok(())
}

pub fn status(ctx: &ClientContext) {
    print_status(&ctx.session.status());
    println!("Server: {}", ctx.config.base_url());
}

pub fn registration_form(
    invitation_code: String,
    username: String,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    password: String,
) -> RegistrationForm {
    RegistrationForm {
        invitation_code,
        username,
        email,
        first_name,
        last_name,
        confirm_password: password.clone(),
        password,
    }
}

pub async fn register(ctx: &ClientContext, form: &RegistrationForm, login: bool) -> Result<()> {
    if login {
        let status = ctx
            .auth
            .register_and_login(form)
            .await
            .map_err(|e| anyhow!(e.user_message()))?;
        println!("Registration successful");
        print_status(&status);
    } else {
        ctx.auth
            .register(form)
            .await
            .map_err(|e| anyhow!(e.user_message()))?;
        println!("Registration successful! You can now log in.");
    }
    Ok(())
}

fn print_status(status: &SessionStatus) {
    match status {
        SessionStatus::Authenticated { username } => println!("Logged in as {}", username),
        SessionStatus::Anonymous => println!("Not logged in"),
    }
}
