#![no_main]

use dom_handler::{DomHandler, DomHandlerOptions, Parser, ParserOptions, check_tree};
use libfuzzer_sys::fuzz_target;

// First byte picks options and chunk size; the rest is markup.
fuzz_target!(|data: &[u8]| {
    let Some((&control, input)) = data.split_first() else {
        return;
    };
    let options = DomHandlerOptions::default()
        .with_indices(control & 1 != 0)
        .xml_mode(control & 2 != 0)
        .normalize_whitespace(control & 4 != 0);
    let chunk = usize::from(control >> 3) + 1;

    let mut parser = Parser::new(DomHandler::new(options), ParserOptions::from(&options));
    for piece in input.chunks(chunk) {
        if parser.write_bytes(piece).is_err() {
            return;
        }
    }
    if parser.end().is_err() {
        return;
    }
    let dom = parser.into_handler().into_dom();
    if let Err(violation) = check_tree(&dom, dom.root()) {
        panic!("invariant violation: {violation}");
    }
});
