use super::common::OutputBuffer;

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

pub fn compact_blank_lines(buffer: OutputBuffer) -> OutputBuffer {
    let mut lines: Vec<String> = Vec::with_capacity(buffer.len());
    let mut previous_blank = false;

    for line in buffer {
        let blank = is_blank(&line);
        if !(blank && previous_blank) {
            lines.push(line);
        }
        previous_blank = blank;
    }

    while lines.last().is_some_and(|line| is_blank(line)) {
        lines.pop();
    }
    lines.into_iter().collect()
}
