use std::collections::BTreeMap;
use std::env;
use std::process;

use swf_tags::{load_movie, Character, LoaderOptions, LoaderServices, MovieDefinition};

fn dump(movie: &MovieDefinition) {
    let headers = movie.headers();
    let (width, height) = headers.dimensions();
    println!(
        "  {:?}, version {}, {} bytes, {}x{} px, {} fps",
        headers.signature(),
        headers.version(),
        headers.file_length(),
        width,
        height,
        headers.frame_rate()
    );
    println!(
        "  frames: {} loaded of {} declared",
        movie.get_loading_frame(),
        movie.get_frame_count()
    );
    if let Some(color) = movie.background_color() {
        println!("  background: #{:02x}{:02x}{:02x}", color.r, color.g, color.b);
    }

    let dictionary = movie.dictionary();
    let mut kinds = BTreeMap::new();
    for id in dictionary.ids() {
        if let Some(character) = dictionary.get(id) {
            *kinds.entry(format!("{:?}", character.kind())).or_insert(0usize) += 1;
            if let Character::Font(font) = character {
                println!(
                    "  font {}: {:?}, {} glyphs, {} kerning pairs",
                    id,
                    font.name(),
                    font.glyph_count(),
                    font.kerning_pair_count()
                );
            }
        }
    }
    for (kind, count) in &kinds {
        println!("  {:>10}: {}", kind, count);
    }

    for (name, id) in movie.exports() {
        println!("  export {:?} -> {}", name, id);
    }
}

fn main() {
    env_logger::init();

    if env::args().count() == 1 {
        eprintln!("USAGE: swfdump a.swf b.swf c.swf ...");
        process::exit(2);
    }

    let mut failed = false;
    for arg in env::args().skip(1) {
        println!("{}:", arg);
        match load_movie(&arg, LoaderServices::default(), LoaderOptions::from_env()) {
            Ok(movie) => dump(&movie),
            Err(err) => {
                eprintln!("  {}", err);
                failed = true;
            }
        }
    }
    if failed {
        process::exit(1);
    }
}
