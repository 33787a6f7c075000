use crate::session::{print_json, Session};

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open()?;
    let snapshot = session.game().snapshot();
    session.close()?;
    print_json(&snapshot)
}
