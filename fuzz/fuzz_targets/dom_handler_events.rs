#![no_main]

use dom_handler::{Attributes, DomHandler, DomHandlerOptions, Handler, check_tree};
use libfuzzer_sys::fuzz_target;

// Each byte is one builder event; unbalanced closes must be rejected, never
// corrupt the tree. Closed elements with an odd child count are evicted.
fuzz_target!(|data: &[u8]| {
    let mut handler = DomHandler::new(DomHandlerOptions::default().normalize_whitespace(true))
        .with_element_callback(|closed| {
            if closed.node().children().count() % 2 == 1 {
                let _ = closed.remove();
            }
        });
    for &op in data {
        match op % 10 {
            0 => handler.on_open_tag("div", Attributes::new()),
            1 => {
                let _ = handler.on_close_tag();
            }
            2 => handler.on_text(" a\t"),
            3 => handler.on_comment("c"),
            4 => handler.on_comment_end(),
            5 => handler.on_cdata_start(),
            6 => handler.on_cdata_end(),
            7 => handler.on_processing_instruction("?x", "?x"),
            8 => {
                let mut copy = handler.dom().clone();
                let root = copy.root();
                if let Ok(cloned) = copy.clone_node(root, op & 0x80 != 0) {
                    if let Err(violation) = check_tree(&copy, cloned) {
                        panic!("clone invariant violation: {violation}");
                    }
                }
            }
            _ => handler.on_reset(),
        }
    }
    handler.on_end();
    let dom = handler.dom();
    if let Err(violation) = check_tree(dom, dom.root()) {
        panic!("invariant violation: {violation}");
    }
});
