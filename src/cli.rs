// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, crate_version, value_parser};

fn json_flags(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print as pretty JSON"),
    )
    .arg(
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .conflicts_with("json")
            .help("Print as JSON lines"),
    )
}

fn series_field_args(cmd: Command, required: bool) -> Command {
    cmd.arg(
        Arg::new("name")
            .long("name")
            .required(required)
            .help("Expense name"),
    )
    .arg(
        Arg::new("amount")
            .long("amount")
            .required(required)
            .help("Amount per occurrence"),
    )
    .arg(
        Arg::new("type")
            .long("type")
            .help("fixed | variable"),
    )
    .arg(
        Arg::new("frequency")
            .long("frequency")
            .help("once | monthly | yearly"),
    )
    .arg(
        Arg::new("start")
            .long("start")
            .required(required)
            .help("First occurrence, YYYY-MM"),
    )
    .arg(
        Arg::new("end")
            .long("end")
            .help("Last occurrence, YYYY-MM (recurring only)"),
    )
    .arg(
        Arg::new("due_day")
            .long("due-day")
            .value_parser(value_parser!(u32))
            .help("Day of month the payment is due (1-31)"),
    )
    .arg(Arg::new("note").long("note").help("Free-text note"))
}

fn locator_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("series")
            .long("series")
            .required(true)
            .help("Series id"),
    )
    .arg(
        Arg::new("at")
            .long("at")
            .help("Occurrence being edited, YYYY-MM"),
    )
    .arg(
        Arg::new("scope")
            .long("scope")
            .default_value("all")
            .help("this | all"),
    )
}

pub fn build_cli() -> Command {
    Command::new("duebook")
        .about("Plan recurring and one-off expenses and track what has been paid")
        .version(crate_version!())
        .subcommand(Command::new("init").about("Create the database"))
        .subcommand(
            Command::new("expense")
                .about("Plan expenses")
                .subcommand(series_field_args(
                    Command::new("add").about("Add a one-off or recurring expense"),
                    true,
                ))
                .subcommand(
                    series_field_args(
                        locator_args(Command::new("update").about("Edit an expense series")),
                        false,
                    )
                    .arg(
                        Arg::new("clear_note")
                            .long("clear-note")
                            .action(ArgAction::SetTrue)
                            .conflicts_with("note"),
                    ),
                )
                .subcommand(locator_args(
                    Command::new("delete").about("Delete an expense series or one occurrence"),
                ))
                .subcommand(json_flags(
                    Command::new("show")
                        .about("Show one series and its instances")
                        .arg(Arg::new("series").long("series").required(true)),
                ))
                .subcommand(json_flags(
                    Command::new("list")
                        .about("List expense instances")
                        .arg(Arg::new("month").long("month").help("YYYY-MM"))
                        .arg(
                            Arg::new("year")
                                .long("year")
                                .value_parser(value_parser!(i32)),
                        )
                        .arg(Arg::new("series").long("series")),
                )),
        )
        .subcommand(
            Command::new("pay")
                .about("Track payments")
                .subcommand(
                    Command::new("toggle")
                        .about("Mark an instance paid, or unpaid if it already is")
                        .arg(Arg::new("id").long("id").required(true)),
                )
                .subcommand(
                    Command::new("record")
                        .about("Record payment details and mark paid")
                        .arg(Arg::new("id").long("id").required(true))
                        .arg(
                            Arg::new("date")
                                .long("date")
                                .help("YYYY-MM-DD, defaults to today"),
                        )
                        .arg(
                            Arg::new("method")
                                .long("method")
                                .help("card | bank | cash"),
                        )
                        .arg(
                            Arg::new("source")
                                .long("source")
                                .help("Where it was paid from"),
                        ),
                ),
        )
        .subcommand(
            Command::new("report")
                .about("Summaries")
                .subcommand(json_flags(
                    Command::new("month")
                        .about("Totals for one month")
                        .arg(
                            Arg::new("month")
                                .long("month")
                                .help("YYYY-MM, defaults to the current month"),
                        ),
                ))
                .subcommand(json_flags(
                    Command::new("year")
                        .about("Per-series rollup for one year")
                        .arg(
                            Arg::new("year")
                                .long("year")
                                .required(true)
                                .value_parser(value_parser!(i32)),
                        ),
                ))
                .subcommand(json_flags(
                    Command::new("all").about("Totals for every planned year"),
                )),
        )
        .subcommand(
            Command::new("export")
                .about("Export data")
                .subcommand(
                    Command::new("instances")
                        .about("Export every expense instance")
                        .arg(
                            Arg::new("format")
                                .long("format")
                                .default_value("csv")
                                .help("csv | json"),
                        )
                        .arg(Arg::new("out").long("out").required(true)),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Settings")
                .subcommand(
                    Command::new("get")
                        .arg(Arg::new("key").long("key").required(true)),
                )
                .subcommand(
                    Command::new("set")
                        .arg(Arg::new("key").long("key").required(true))
                        .arg(Arg::new("value").long("value").required(true)),
                )
                .subcommand(Command::new("list")),
        )
        .subcommand(Command::new("doctor").about("Check stored instances for inconsistencies"))
}
