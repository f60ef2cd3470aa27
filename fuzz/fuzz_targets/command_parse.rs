#![no_main]

use cairn_plugin::{parse_commands, ArgumentMode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let body = String::from_utf8_lossy(data);
    let command_lines = body
        .lines()
        .filter(|line| line.trim().starts_with('/'))
        .count();
    for mode in [ArgumentMode::Split, ArgumentMode::Remainder] {
        let commands = parse_commands(&body, mode);
        assert!(commands.len() <= command_lines);
        for command in commands {
            assert!(!command.name.is_empty());
            assert!(!command.name.starts_with('/'));
            assert!(!command.name.contains(char::is_whitespace));
            if mode == ArgumentMode::Remainder {
                assert!(command.args.len() <= 1);
            }
        }
    }
});
