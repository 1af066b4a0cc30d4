use pgnparser_rs::{Game, NagFormat, Validation};
use std::io::{Error, ErrorKind, Write};

/// What to print for each game.
#[derive(Clone, Copy, Debug)]
pub struct DumpOptions {
    pub tags: bool,
    pub moves: bool,
    pub nag_format: NagFormat,
    pub deep: bool,
}

pub fn dump_game(game: &Game, opts: DumpOptions, out: &mut impl Write) -> Result<(), Error> {
    writeln!(
        out,
        "Game {}: {} - {} {}",
        game.sequence_number(),
        game.white().unwrap_or("?"),
        game.black().unwrap_or("?"),
        game.result()
    )?;
    if opts.tags {
        for tag in game.tags() {
            writeln!(out, "  [{} \"{}\"]", tag.name(), tag.value())?;
        }
    }
    if opts.moves {
        let mut movetext = String::new();
        game.main_line()
            .write_movetext(&mut movetext, opts.nag_format)
            .map_err(|err| Error::new(ErrorKind::Other, err))?;
        writeln!(out, "  {movetext}")?;
        writeln!(out, "  ({} lines)", game.leaf_count())?;
    }
    let status = game.validate(if opts.deep {
        Validation::Deep
    } else {
        Validation::Simple
    });
    if !status.is_valid() {
        writeln!(out, "  status: {status}")?;
    }
    Ok(())
}
