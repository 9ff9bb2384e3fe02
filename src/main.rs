use pokemon_matchmaker::mcp_interface::{
    bid_match, finish_match, list_biddable_modes, roll_match, BidReply, MatchSession,
};
use std::env;
use tracing_subscriber::EnvFilter;

// Usage: pokemon-matchmaker [config dir] [event id] [bid]...
// Without bids, rolls three automated matches.
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let config_dir = args.next().unwrap_or_else(|| "config".to_string());
    let event_id = args.next().unwrap_or_else(|| "standard".to_string());
    let bids: Vec<String> = args.collect();

    let mut session = match MatchSession::load(&config_dir, &event_id, None) {
        Ok(session) => session,
        Err(e) => {
            println!("Error loading matchmaker configuration: {}", e);
            return;
        }
    };

    println!("{}", list_biddable_modes(session.matchmaker()));
    println!();

    if bids.is_empty() {
        for _ in 0..3 {
            match roll_match(&mut session) {
                Ok(text) => println!("{}", text),
                Err(e) => println!("Error making match: {}", e),
            }
            println!("{}", finish_match(&mut session, 1));
            println!();
        }
        return;
    }

    for command in &bids {
        match bid_match(&mut session, command) {
            Ok(BidReply::Accepted(text)) => println!("{}", text),
            Ok(BidReply::Rejected(reason)) => println!("Bid rejected: {}", reason),
            Err(e) => println!("Error making match: {}", e),
        }
        if session.pending().is_some() {
            println!("{}", finish_match(&mut session, 1));
        }
        println!();
    }
}
