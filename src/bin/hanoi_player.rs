use hanoi_solver::engine::Game;
use hanoi_solver::utils::frame_stewart;
use std::io::{self, Write};

const PEGS: usize = 4;
const DISKS: usize = 5;

fn main() {
    let mut game = Game::<PEGS, DISKS>::new();
    let best = frame_stewart(PEGS, DISKS);
    println!("Welcome to the Tower of Hanoi!");
    println!(
        "Move all {} disks from peg 0 to any other peg. Best known: {} moves.",
        DISKS, best
    );

    loop {
        println!("---------------------");
        println!("{}", game.state());

        if game.is_solved() {
            println!();
            println!("---------------------");
            println!("🎉 SOLVED! 🎉");
            println!("Total Steps: {} (best known: {})", game.steps(), best);
            println!("---------------------");
            break;
        }

        print!("Enter your move (from to), or 'u' to undo, 'q' to quit: ");
        if io::stdout().flush().is_err() {
            break;
        }

        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) => break,
            Ok(_) => {}
            Err(_) => {
                println!("Error reading input. Please try again.");
                continue;
            }
        }

        let trimmed_input = input.trim();

        if trimmed_input == "q" {
            println!("Thanks for playing!");
            break;
        }

        if trimmed_input == "u" {
            if game.undo_last_move() {
                println!("Move undone.");
            } else {
                println!("Cannot undo further, no moves made.");
            }
            continue;
        }

        let parts: Vec<&str> = trimmed_input.split_whitespace().collect();
        if parts.len() != 2 {
            println!("Invalid input format. Use 'from to', 'u', or 'q'.");
            continue;
        }
        match (parts[0].parse::<usize>(), parts[1].parse::<usize>()) {
            (Ok(from), Ok(to)) if from < PEGS && to < PEGS => {
                if !game.process_move(from, to) {
                    println!(
                        "Illegal move: peg {} is empty, or its top disk is larger than the top of peg {}.",
                        from, to
                    );
                }
            }
            (Ok(_), Ok(_)) => {
                println!("Invalid pegs: both must be between 0 and {}.", PEGS - 1);
            }
            _ => {
                println!("Invalid input: Please enter two peg numbers (e.g., '0 2'), 'u', or 'q'.");
            }
        }
    }
}
