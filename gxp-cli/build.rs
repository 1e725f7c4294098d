use clap::{Arg, ArgAction, Command, ValueHint};
use clap_complete::{generate_to, shells::*};
use std::env;
use std::io::Error;

// Mirror of OutputLanguage and Phase names from gxp-compiler.
// Build scripts cannot depend on the crate they build alongside.
const OUTPUT_LANGUAGES: &[&str] = &["java", "cpp", "cpp-header", "javascript", "xmb"];
const PHASES: &[&str] = &[
    "parse",
    "if-expand",
    "reparent",
    "bind",
    "collapse",
    "insert-placeholders",
    "escape",
    "validate",
    "flatten",
    "pivot",
    "i18n-check",
    "extract-messages",
];

fn main() -> Result<(), Error> {
    let outdir = match env::var_os("OUT_DIR") {
        None => return Ok(()),
        Some(outdir) => outdir,
    };

    let path_option = |name: &'static str, hint: ValueHint| {
        Arg::new(name)
            .long(name)
            .value_name("PATH")
            .value_hint(hint)
    };
    let mut cmd = Command::new("gxpc")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Compiles gxp templates into Java, C++, JavaScript and XMB")
        .arg(
            Arg::new("sources")
                .required(true)
                .num_args(1..)
                .value_hint(ValueHint::AnyPath),
        )
        .arg(path_option("source-root", ValueHint::DirPath))
        .arg(path_option("output-dir", ValueHint::DirPath))
        .arg(
            Arg::new("output-language")
                .long("output-language")
                .action(ArgAction::Append)
                .value_parser(clap::builder::PossibleValuesParser::new(OUTPUT_LANGUAGES)),
        )
        .arg(
            Arg::new("allow-output")
                .long("allow-output")
                .action(ArgAction::Append),
        )
        .arg(path_option("schema", ValueHint::FilePath).action(ArgAction::Append))
        .arg(path_option("dependency-file", ValueHint::FilePath))
        .arg(path_option("message-bundle", ValueHint::FilePath))
        .arg(path_option("config", ValueHint::FilePath))
        .arg(Arg::new("debug").long("debug").action(ArgAction::SetTrue))
        .arg(
            Arg::new("warnings-as-errors")
                .long("warnings-as-errors")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dump-tree")
                .long("dump-tree")
                .value_parser(clap::builder::PossibleValuesParser::new(PHASES)),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::SetTrue),
        );

    // Generate completions for bash
    generate_to(Bash, &mut cmd, "gxpc", &outdir)?;

    // Generate completions for zsh
    generate_to(Zsh, &mut cmd, "gxpc", &outdir)?;

    // Generate completions for fish
    generate_to(Fish, &mut cmd, "gxpc", &outdir)?;

    println!("cargo:warning=Shell completions generated in {outdir:?}");

    Ok(())
}
