use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use runtogether_process::{Command, Launcher, LocalLauncher, ProcessHandle};

#[derive(Args)]
pub struct CiArgs {
    #[command(subcommand)]
    cmd: CiCommand,
}

#[derive(Subcommand)]
pub enum CiCommand {
    /// Run all CI checks
    All,
    /// Format check (read-only)
    #[command(name = "fmt-check")]
    FmtCheck,
    /// Clippy lints
    Clippy,
    /// Cargo deny check
    Deny,
    /// Library and binary unit tests
    UnitTests,
    /// Tests that spawn real processes and send real signals
    IntegrationTests,
}

pub async fn run(args: CiArgs) -> Result<()> {
    match args.cmd {
        CiCommand::All => run_all().await,
        CiCommand::FmtCheck => run_fmt().await,
        CiCommand::Clippy => run_clippy().await,
        CiCommand::Deny => run_deny().await,
        CiCommand::UnitTests => run_unit_tests().await,
        CiCommand::IntegrationTests => run_integration_tests().await,
    }
}

async fn run_all() -> Result<()> {
    println!("Running all CI checks\n");

    println!("Checking code formatting...");
    run_fmt().await?;
    println!("Format check passed\n");

    println!("Running clippy lints...");
    run_clippy().await?;
    println!("Clippy check passed\n");

    if cargo("deny", &["--version"]).await.unwrap_or(false) {
        println!("Running cargo deny...");
        run_deny().await?;
        println!("Dependency check passed\n");
    }

    println!("Running unit tests...");
    run_unit_tests().await?;
    println!("Unit tests passed\n");

    println!("Running integration tests...");
    run_integration_tests().await?;
    println!("Integration tests passed\n");

    println!("All CI checks passed!");
    Ok(())
}

async fn run_fmt() -> Result<()> {
    if !cargo("fmt", &["--all", "--", "--check"]).await? {
        bail!("Format check failed. Run 'cargo fmt --all' to fix.");
    }
    Ok(())
}

async fn run_clippy() -> Result<()> {
    let args = ["--workspace", "--all-targets", "--", "-D", "warnings"];
    if !cargo("clippy", &args).await? {
        bail!("Clippy check failed");
    }
    Ok(())
}

async fn run_deny() -> Result<()> {
    if !cargo("deny", &["check"]).await? {
        bail!("Cargo deny check failed");
    }
    Ok(())
}

async fn run_unit_tests() -> Result<()> {
    if !cargo("test", &["--workspace", "--lib", "--bins"]).await? {
        bail!("Unit tests failed");
    }
    Ok(())
}

async fn run_integration_tests() -> Result<()> {
    // Signal tests deliver SIGINT/SIGTERM to the test process itself, so they
    // must not share it with other tests.
    let args = ["--workspace", "--tests", "--", "--test-threads=1"];
    if !cargo("test", &args).await? {
        bail!("Integration tests failed");
    }
    Ok(())
}

/// Run `cargo <subcommand> <args>` with inherited stdio; true on success
async fn cargo(subcommand: &str, args: &[&str]) -> Result<bool> {
    let mut cmd = Command::new("cargo");
    cmd.arg(subcommand).args(args);

    let mut handle = LocalLauncher.launch(&cmd).await?;
    let status = handle.reap().await?;
    Ok(status.success())
}
