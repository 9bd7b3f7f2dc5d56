use anyhow::Result;
use colored::Colorize;
use rustyline::highlight::Highlighter;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;
use std::collections::HashMap;
use std::env;
use tickwheel::prelude::*;
use tickwheel::{ENGINE_NAME, VERSION as LIB_VERSION};
use tracing::info;

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A custom helper struct for rustyline that enables syntax highlighting.
#[derive(Completer, Helper, Hinter, Validator)]
struct CommandHighlighter;

impl Highlighter for CommandHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            let colored_command = command.yellow().bold();
            let colored_rest = rest.yellow();
            Cow::Owned(format!("{} {}", colored_command, colored_rest))
        } else {
            Cow::Owned(line.yellow().bold().to_string())
        }
    }
    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn print_banner() {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    const LOGO_TEXT: &str = include_str!("../logo.log");
    println!("{}", LOGO_TEXT.cyan());
    println!(
        "          Shell   v{:<8} Library   v{:<8}",
        SHELL_VERSION, LIB_VERSION
    );
    println!(
        "{}",
        "-------------------------------------------------------".dimmed()
    );
}

fn print_help() {
    println!("Available commands:");
    println!("  add <DELAY>            - Adds a one-shot task firing DELAY units from now.");
    println!("  every <IVL> [COUNT]    - Adds a repeating task (COUNT times, or forever).");
    println!("  remove <HANDLE>        - Cancels a task by its handle.");
    println!("  advance <UNITS>        - Moves virtual time forward by UNITS.");
    println!("  tick                   - Moves virtual time forward by one base tick.");
    println!("  list                   - Shows active tasks and their handles.");
    println!("  layout                 - Shows the wheel geometry and clock position.");
    println!("  build <SLOTS..>        - Stacks outer levels with the given slot counts.");
    println!("  clear                  - Removes every scheduled task.");
    println!("  exit                   - Quits the shell.");
}

fn main() -> Result<()> {
    print_banner();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    // A small default face: 10 one-unit slots, one 6-slot outer ring.
    // `build` can stack more levels at runtime.
    let mut wheel = TimingWheel::new(10, 1, 0)?;
    wheel.build_parent(&[6])?;
    info!("loaded {} v{}", ENGINE_NAME, LIB_VERSION);

    // The shell's state management variables.
    let mut active_tasks: HashMap<usize, TaskId> = HashMap::new();
    let mut next_handle: usize = 0;

    let mut rl = Editor::new()?;
    rl.set_helper(Some(CommandHighlighter));

    println!(
        "{} is loaded. Virtual time only moves on 'advance'. Type 'help' for commands.",
        ENGINE_NAME.cyan()
    );

    loop {
        let prompt = format!("{}", ">> ".cyan().bold());
        let readline = rl.readline(&prompt);
        let line = match readline {
            Ok(line) => line,
            Err(_) => {
                println!("Exiting tickshell...");
                break;
            }
        };
        rl.add_history_entry(line.as_str())?;
        let args = line.trim().split_whitespace().collect::<Vec<_>>();

        match args.first().copied() {
            Some("add") => {
                let Some(delay) = args.get(1).and_then(|s| s.parse::<u64>().ok()) else {
                    println!("Usage: add <DELAY>");
                    continue;
                };
                let handle = next_handle;
                let task = TimerTask::once(move |wheel, _| {
                    println!(
                        "{} task #{} fired at virtual time {}",
                        "<--".green(),
                        handle,
                        wheel.current_time()
                    );
                    Ok(())
                });
                match wheel.add_task(task, delay) {
                    Ok(id) => {
                        active_tasks.insert(handle, id);
                        next_handle += 1;
                        println!("--> Added one-shot task #{} firing at {}.", handle, delay);
                    }
                    Err(err) => println!("Error: {}", err),
                }
            }
            Some("every") => {
                let Some(interval) = args.get(1).and_then(|s| s.parse::<u64>().ok()) else {
                    println!("Usage: every <INTERVAL> [COUNT]");
                    continue;
                };
                let count = args.get(2).and_then(|s| s.parse::<u32>().ok());
                let handle = next_handle;
                let effect = move |wheel: &mut TimingWheel, _: TaskId| -> anyhow::Result<()> {
                    println!(
                        "{} task #{} fired at virtual time {}",
                        "<--".green(),
                        handle,
                        wheel.current_time()
                    );
                    Ok(())
                };
                let task = match count {
                    Some(times) => TimerTask::repeating(times, interval, effect),
                    None => TimerTask::perpetual(interval, effect),
                };
                match wheel.add_task(task, interval) {
                    Ok(id) => {
                        active_tasks.insert(handle, id);
                        next_handle += 1;
                        match count {
                            Some(times) => println!(
                                "--> Added task #{}: {} firings every {} units.",
                                handle, times, interval
                            ),
                            None => println!(
                                "--> Added task #{}: firing every {} units forever.",
                                handle, interval
                            ),
                        }
                    }
                    Err(err) => println!("Error: {}", err),
                }
            }
            Some("remove") => {
                let Some(handle) = args.get(1).and_then(|s| s.parse::<usize>().ok()) else {
                    println!("Usage: remove <HANDLE>");
                    continue;
                };
                match active_tasks.remove(&handle) {
                    Some(id) => {
                        if wheel.remove_task(id) {
                            println!("--> Task #{} cancelled.", handle);
                        } else {
                            println!("--> Task #{} had already retired.", handle);
                        }
                    }
                    None => println!(
                        "Error: Invalid handle #{}. Use 'list' to see active tasks.",
                        handle
                    ),
                }
            }
            Some("advance") => {
                let Some(units) = args.get(1).and_then(|s| s.parse::<u64>().ok()) else {
                    println!("Usage: advance <UNITS>");
                    continue;
                };
                if let Err(err) = wheel.advance(units) {
                    for failure in &err.failures {
                        println!("{} {:?}: {:#}", "!!".red(), failure.task, failure.error);
                    }
                }
                println!(
                    "--> Virtual time is now {} ({} task(s) pending).",
                    wheel.current_time(),
                    wheel.scheduled_len()
                );
            }
            Some("tick") => {
                if let Err(err) = wheel.tick() {
                    for failure in &err.failures {
                        println!("{} {:?}: {:#}", "!!".red(), failure.task, failure.error);
                    }
                }
                println!("--> Virtual time is now {}.", wheel.current_time());
            }
            Some("list") => {
                active_tasks.retain(|_, id| wheel.contains_task(*id));
                println!("Active tasks:");
                let mut handles: Vec<_> = active_tasks.iter().collect();
                handles.sort();
                for (handle, id) in handles {
                    println!("  #{}: {:?}", handle, id);
                }
            }
            Some("layout") => {
                println!(
                    "Virtual time {} / timestamp {} / {} task(s) pending",
                    wheel.current_time(),
                    wheel.timestamp(),
                    wheel.scheduled_len()
                );
                for (i, (tick_span, slot_count)) in wheel.level_layout().iter().enumerate() {
                    println!(
                        "  level {}: {} slots x {} units = {} span",
                        i,
                        slot_count,
                        tick_span,
                        tick_span * *slot_count as u64
                    );
                }
            }
            Some("build") => {
                let counts: Vec<usize> = args[1..]
                    .iter()
                    .filter_map(|s| s.parse::<usize>().ok())
                    .collect();
                if counts.is_empty() {
                    println!("Usage: build <SLOTS> [SLOTS..]");
                    continue;
                }
                match wheel.build_parent(&counts) {
                    Ok(()) => println!(
                        "--> Hierarchy is now {} level(s) deep, spanning {} units.",
                        wheel.height(),
                        wheel.total_span()
                    ),
                    Err(err) => println!("Error: {}", err),
                }
            }
            Some("clear") => {
                wheel.clear_tasks();
                active_tasks.clear();
                println!("--> All tasks removed.");
            }
            Some("help") => print_help(),
            Some("exit") => break,
            Some("") | None => {}
            Some(other) => println!("Unknown command: '{}'. Type 'help'.", other),
        }
    }

    Ok(())
}
