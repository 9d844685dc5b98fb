use clap::{arg, command, crate_name, ArgAction, Command};
use cli::client::{list_owner_files, upload_single_file};
use client::UploadParams;

mod cli;

#[tokio::main]
async fn main() {
    let cli = command!(crate_name!())
        .version(clap::crate_version!())
        .about(clap::crate_description!())
        .subcommand(Command::new(cli::VERSION_SUBCOMMAND).about(cli::VERSION_DESCRIPTION))
        .subcommand(Command::new(cli::BUGREPORT_SUBCOMMAND).about(cli::BUGREPORT_DESCRIPTION))
        .subcommand(Command::new(cli::SERVER_SUBCOMMAND).about(cli::SERVER_DESCRIPTION))
        .subcommand(
            Command::new(cli::UPLOAD_SUBCOMMAND)
                .about(cli::UPLOAD_DESCRIPTION)
                .arg(arg!(-u --uri <URI>).required(true).help("Cloudstore URI"))
                .arg(arg!(-o --owner <OWNER>).required(true).help("Owner id"))
                .arg(
                    arg!(-f --file <FILE>)
                        .required(true)
                        .help("Path to file to upload"),
                ),
        )
        .subcommand(
            Command::new(cli::LIST_SUBCOMMAND)
                .about(cli::LIST_DESCRIPTION)
                .arg(arg!(-u --uri <URI>).required(true).help("Cloudstore URI"))
                .arg(arg!(-o --owner <OWNER>).required(true).help("Owner id"))
                .arg(
                    arg!(-t --trash)
                        .action(ArgAction::SetTrue)
                        .help("List trashed files instead of active ones"),
                ),
        )
        .arg_required_else_help(true)
        .disable_version_flag(true)
        .get_matches();

    if cli.subcommand_matches(cli::VERSION_SUBCOMMAND).is_some() {
        cli::version::run();
    } else if cli.subcommand_matches(cli::BUGREPORT_SUBCOMMAND).is_some() {
        cli::bugreport::run();
    } else if cli.subcommand_matches(cli::SERVER_SUBCOMMAND).is_some() {
        cli::server::run().await;
    } else if let Some(upload_matches) = cli.subcommand_matches(cli::UPLOAD_SUBCOMMAND) {
        let uri = upload_matches.get_one::<String>("uri").unwrap();
        let owner = upload_matches.get_one::<String>("owner").unwrap();
        let file = upload_matches.get_one::<String>("file").unwrap();
        let params = UploadParams {
            uri: uri.clone(),
            file: file.clone(),
            owner: owner.clone(),
        };
        upload_single_file(params).await;
    } else if let Some(list_matches) = cli.subcommand_matches(cli::LIST_SUBCOMMAND) {
        let uri = list_matches.get_one::<String>("uri").unwrap();
        let owner = list_matches.get_one::<String>("owner").unwrap();
        let trash = list_matches.get_flag("trash");
        list_owner_files(uri, owner, trash).await;
    }
}
