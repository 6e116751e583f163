use lantern::interpreter::{Interpreter, StepResult};
use lantern::memory::Memory;
use lantern::zrand::ZRand;
use log::{debug, info};
use std::env;
use std::fs::File;
use std::io::prelude::*;
use std::io::{self, BufRead};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("lantern - an interpreter for Infocom-format story files");
        println!();
        println!("Usage: {} <story_file> [--seed N]", args[0]);
        println!();
        println!("The --seed option makes the random number generator");
        println!("predictable, for replays and testing.");
        return Ok(());
    }

    let story_path = &args[1];
    let mut seed = None;
    if args.len() >= 4 && args[2] == "--seed" {
        let value: u64 = args[3]
            .parse()
            .map_err(|_| format!("invalid seed: {}", args[3]))?;
        seed = Some(value);
        info!("predictable random numbers, seed {}", value);
    }

    debug!("loading story file {}", story_path);
    let mut file = match File::open(story_path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Error: cannot open story file '{}': {}", story_path, e);
            std::process::exit(1);
        }
    };
    let mut story_data = Vec::new();
    if let Err(e) = file.read_to_end(&mut story_data) {
        eprintln!("Error: cannot read story file '{}': {}", story_path, e);
        std::process::exit(1);
    }

    let memory = Memory::from_bytes(story_data)?;
    let rand = match seed {
        Some(seed) => ZRand::new_predictable(seed),
        None => ZRand::new_uniform(),
    };
    let mut interpreter = Interpreter::new(memory, rand);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        let result = interpreter.run()?;
        print!("{}", interpreter.take_output());
        io::stdout().flush()?;
        match result {
            StepResult::Quit => break,
            StepResult::AwaitingInput => match lines.next() {
                Some(line) => interpreter.provide_input(&line?),
                None => break, // end of input, behave like quit
            },
            StepResult::Continued => unreachable!(),
        }
    }

    debug!("story ended");
    Ok(())
}
