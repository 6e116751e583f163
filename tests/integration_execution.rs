//! End-to-end programs running through the public interpreter surface.

use lantern::interpreter::{Interpreter, StepResult};
use lantern::test_utils::StoryBuilder;
use lantern::zrand::ZRand;
use test_log::test;

fn run_to_quit(b: &StoryBuilder) -> String {
    let mut interp = Interpreter::new(b.build(), ZRand::new_predictable(11));
    assert_eq!(interp.run().unwrap(), StepResult::Quit);
    interp.take_output()
}

#[test]
fn countdown_loop_prints_each_value() {
    let mut b = StoryBuilder::new(3);
    b.global(0, 3);
    b.code(&[
        // loop: print_num g16; dec_chk g16 < 1 ?done; jump loop
        0xE6, 0xBF, 0x10, // print_num g16
        0x04, 0x10, 0x01, 0xC5, // dec_chk g16 #1 ?+5 (to quit)
        0x8C, 0xFF, 0xF8, // jump -8 (back to print_num)
        0xBA, // quit
    ]);
    assert_eq!(run_to_quit(&b), "321");
}

#[test]
fn recursive_factorial_through_routine_calls() {
    let mut b = StoryBuilder::new(3);
    // main: call fact(5) -> sp; print_num sp; quit
    b.code(&[
        0xE0, 0x1F, 0x08, 0x00, 0x05, 0x00, // call_vs 0x0800 #5 -> sp
        0xE6, 0xBF, 0x00, // print_num sp
        0xBA,
    ]);
    // fact(n) at 0x1000, locals n and tmp:
    //   if n > 1 goto recurse; return 1
    //   recurse: tmp = n - 1; return n * fact(tmp)
    b.write_bytes(
        0x1000,
        &[
            0x02, 0x00, 0x00, 0x00, 0x00, // two locals defaulting to 0
            0x43, 0x01, 0x01, 0xC4, // jg local1 #1 ?+4
            0x9B, 0x01, // ret 1
            0x55, 0x01, 0x01, 0x02, // sub local1 #1 -> local2
            0xE0, 0x2F, 0x08, 0x00, 0x02, 0x00, // call_vs 0x0800 local2 -> sp
            0x76, 0x01, 0x00, 0x00, // mul local1 sp -> sp
            0xAB, 0x00, // ret sp
        ],
    );
    assert_eq!(run_to_quit(&b), "120");
}

#[test]
fn object_shuffle_and_reporting() {
    let mut b = StoryBuilder::new(3);
    b.object(1, 0, 0, 2);
    b.object(2, 1, 3, 0);
    b.object(3, 1, 0, 0);
    b.code(&[
        0x99, 0x02, // remove_obj 2
        0x93, 0x02, 0x00, // get_parent 2 -> sp
        0xE6, 0xBF, 0x00, // print_num sp
        0x92, 0x01, 0x00, 0x42, // get_child 1 -> sp ?~+2
        0xE6, 0xBF, 0x00, // print_num sp
        0xBA,
    ]);
    assert_eq!(run_to_quit(&b), "03");
}

#[test]
fn read_loop_consumes_two_commands() {
    let mut b = StoryBuilder::new(3);
    b.dictionary(&["go", "north", "quit"], b"");
    b.code(&[
        0xE4, 0x0F, 0x07, 0x00, 0x07, 0x40, // sread 0x700 0x740
        // loadw 0x742... check first word matched; print_num count instead
        0xD0, 0x1F, 0x07, 0x41, 0x00, 0x00, // loadb 0x741 0 -> sp
        0xE6, 0xBF, 0x00, // print_num sp
        0xE4, 0x0F, 0x07, 0x00, 0x07, 0x40, // sread again
        0xD0, 0x1F, 0x07, 0x41, 0x00, 0x00,
        0xE6, 0xBF, 0x00,
        0xBA,
    ]);
    b.write_bytes(0x700, &[30]);
    b.write_bytes(0x740, &[6]);

    let mut interp = Interpreter::new(b.build(), ZRand::new_uniform());
    assert_eq!(interp.run().unwrap(), StepResult::AwaitingInput);
    interp.provide_input("go north");
    assert_eq!(interp.run().unwrap(), StepResult::AwaitingInput);
    assert_eq!(interp.take_output(), "2");
    interp.provide_input("quit");
    assert_eq!(interp.run().unwrap(), StepResult::Quit);
    assert_eq!(interp.take_output(), "1");
}

#[test]
fn seeded_random_replays_identically() {
    let mut b = StoryBuilder::new(3);
    b.code(&[
        0xE7, 0x7F, 0x64, 0x00, // random #100 -> sp
        0xE6, 0xBF, 0x00, // print_num sp
        0xE7, 0x7F, 0x64, 0x00,
        0xE6, 0xBF, 0x00,
        0xBA,
    ]);
    let story = b.build();
    let replay = {
        let mut b2 = StoryBuilder::new(3);
        b2.code(&[
            0xE7, 0x7F, 0x64, 0x00,
            0xE6, 0xBF, 0x00,
            0xE7, 0x7F, 0x64, 0x00,
            0xE6, 0xBF, 0x00,
            0xBA,
        ]);
        b2.build()
    };

    let mut a = Interpreter::new(story, ZRand::new_predictable(99));
    let mut c = Interpreter::new(replay, ZRand::new_predictable(99));
    a.run().unwrap();
    c.run().unwrap();
    assert_eq!(a.take_output(), c.take_output());
}

#[test]
fn v5_extended_arithmetic_and_calls() {
    let mut b = StoryBuilder::new(5);
    b.code(&[
        0xE0, 0x1F, 0x04, 0x00, 0x09, 0x00, // call_vs 0x0400 #9 -> sp (0x1000)
        0xE6, 0xBF, 0x00, // print_num sp
        0xBA,
    ]);
    // routine: one local; log_shift local1 #2 -> sp; ret sp
    b.write_bytes(
        0x1000,
        &[
            0x01, // local count (v5: no default words)
            0xBE, 0x02, 0x97, 0x01, 0x02, 0x00, // log_shift local1 #2 -> sp
            0xAB, 0x00, // ret sp
        ],
    );
    assert_eq!(run_to_quit(&b), "36");
}

#[test]
fn abbreviated_strings_print_through_opcodes() {
    let mut b = StoryBuilder::new(3);
    // abbreviation table at 0x600, slot 0 -> word addr 0x340 (byte 0x680)
    b.write_bytes(0x18, &[0x06, 0x00]);
    b.write_bytes(0x600, &[0x03, 0x40]);
    // "hello" at 0x680
    b.write_bytes(0x680, &[0x35, 0x51, 0xC6, 0x85]);
    // main string at 0x690: abbrev(1,0) then pad
    b.write_bytes(0x690, &[0x84, 0x25]);
    b.code(&[
        0x87, 0x06, 0x90, // print_addr 0x690
        0xBA,
    ]);
    assert_eq!(run_to_quit(&b), "hello");
}

#[test]
fn fatal_errors_surface_as_results() {
    // routine header declaring 16 locals
    let mut b = StoryBuilder::new(3);
    b.code(&[0xE0, 0x3F, 0x08, 0x00, 0x00, 0xBA]);
    b.write_bytes(0x1000, &[0x10]);
    let mut interp = Interpreter::new(b.build(), ZRand::new_uniform());
    let err = interp.run().unwrap_err();
    assert!(err.contains("locals"), "unexpected error: {}", err);
}
