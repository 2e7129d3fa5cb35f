use anyhow::{Result, bail};
use spendlens_application::ClientContext;
use spendlens_core::invitation::InvitationCheck;

pub async fn check(ctx: &ClientContext, code: &str) -> Result<()> {
    ctx.invitations.on_input(code);
    match ctx.invitations.verify().await {
        InvitationCheck::Valid => {
            println!("Invitation code {} is valid", ctx.invitations.code());
            Ok(())
        }
        InvitationCheck::Invalid(reason) => bail!("{}", reason),
        // verify() always settles on Valid or Invalid.
        other => bail!("Invitation code not checked ({:?})", other),
    }
}
