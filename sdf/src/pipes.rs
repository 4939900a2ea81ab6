//! CLI helpers shared by the command-line utilities
//!
//! Recognizes the `pipe[=input][,output]` option token and pairs the
//! positional input/output filenames with the resulting flags, arranging
//! an in-place rewrite through a temporary file when the input and output
//! name the same file.

use crate::diagnostics;
use crate::source::{ByteSink, ByteSource};
use sdf_core::{Result, SdfError};
use std::path::PathBuf;

/// Which standard streams a utility was asked to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipeFlags {
    pub input: bool,
    pub output: bool,
}

impl PipeFlags {
    pub const NONE: PipeFlags = PipeFlags {
        input: false,
        output: false,
    };
}

/// Parse a `pipe[=input][,output]` option token
///
/// Accepts the token with or without a leading dash. A bare `pipe` means
/// both standard input and standard output. Returns `None` when the token
/// is not a pipe option at all.
pub fn parse_pipe_option(token: &str) -> Option<PipeFlags> {
    let token = token.strip_prefix('-').unwrap_or(token);
    if token == "pipe" {
        return Some(PipeFlags {
            input: true,
            output: true,
        });
    }
    let rest = token.strip_prefix("pipe=")?;
    let mut flags = PipeFlags::NONE;
    for part in rest.split(',') {
        match part {
            "input" | "in" => flags.input = true,
            "output" | "out" => flags.output = true,
            _ => return None,
        }
    }
    if flags.input || flags.output {
        Some(flags)
    } else {
        None
    }
}

/// Where a utility should read from and write to
#[derive(Debug)]
pub struct FilenamePair {
    /// `None` means standard input
    pub input: Option<PathBuf>,
    /// `None` means standard output; ignored when `in_place` is set
    pub output: Option<PathBuf>,
    /// The output replaces the input through a temporary file
    pub in_place: bool,
}

impl FilenamePair {
    /// Open the input side
    pub fn open_source(&self) -> Result<ByteSource> {
        match &self.input {
            Some(path) => ByteSource::open(path),
            None => Ok(ByteSource::stdin()),
        }
    }

    /// Open the output side, honoring the in-place arrangement
    pub fn open_sink(&self) -> Result<ByteSink> {
        if self.in_place {
            let path = self.input.as_ref().ok_or_else(|| {
                SdfError::usage("in-place rewrite requires a named input file")
            })?;
            return ByteSink::create_in_place(path);
        }
        match &self.output {
            Some(path) => ByteSink::create(path),
            None => Ok(ByteSink::stdout()),
        }
    }
}

/// Pair the positional filename arguments with the pipe flags
///
/// The rules the utilities share:
/// - with `pipe=input`, the only permitted filename is the output;
/// - with `pipe=output`, the only permitted filename is the input;
/// - one filename and no pipe flags means rewrite that file in place;
/// - a missing input without `pipe=input` is an error.
///
/// Warnings (ambiguous combinations, impending in-place overwrites) go to
/// the stream's caller via the returned queue-less diagnostics sink.
pub fn process_filenames(
    program: &str,
    input: Option<&str>,
    output: Option<&str>,
    pipe: PipeFlags,
    warn: bool,
) -> Result<FilenamePair> {
    diagnostics::register_program_name(program);

    if pipe.input && input.is_some() && output.is_some() {
        return Err(SdfError::usage(
            "too many filenames given with pipe=input",
        ));
    }

    let (input_path, output_path) = if pipe.input {
        // the single filename, if any, is the output
        (None, input.or(output))
    } else {
        (input, output)
    };

    if input_path.is_none() && !pipe.input {
        return Err(SdfError::usage("no input file given (use pipe=input to read standard input)"));
    }

    let in_place = !pipe.output
        && input_path.is_some()
        && (output_path.is_none() || output_path == input_path);

    if in_place && warn {
        eprintln!(
            "{program}: warning: {} will be rewritten in place",
            input_path.unwrap_or("input")
        );
    }

    if pipe.output && output_path.is_some() {
        return Err(SdfError::usage("an output filename conflicts with pipe=output"));
    }

    Ok(FilenamePair {
        input: input_path.map(PathBuf::from),
        output: if in_place {
            None
        } else {
            output_path.map(PathBuf::from)
        },
        in_place,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipe_tokens() {
        assert_eq!(
            parse_pipe_option("pipe"),
            Some(PipeFlags { input: true, output: true })
        );
        assert_eq!(
            parse_pipe_option("-pipe=input"),
            Some(PipeFlags { input: true, output: false })
        );
        assert_eq!(
            parse_pipe_option("pipe=output"),
            Some(PipeFlags { input: false, output: true })
        );
        assert_eq!(
            parse_pipe_option("pipe=input,output"),
            Some(PipeFlags { input: true, output: true })
        );
        assert_eq!(parse_pipe_option("pipes"), None);
        assert_eq!(parse_pipe_option("pipe=sideways"), None);
    }

    #[test]
    fn test_in_place_detection() {
        let pair =
            process_filenames("sdf_test", Some("data.sdf"), None, PipeFlags::NONE, false)
                .unwrap();
        assert!(pair.in_place);
        assert_eq!(pair.input.as_deref(), Some(std::path::Path::new("data.sdf")));

        let pair = process_filenames(
            "sdf_test",
            Some("in.sdf"),
            Some("out.sdf"),
            PipeFlags::NONE,
            false,
        )
        .unwrap();
        assert!(!pair.in_place);
    }

    #[test]
    fn test_pipe_input_takes_single_name_as_output() {
        let pair = process_filenames(
            "sdf_test",
            Some("out.sdf"),
            None,
            PipeFlags { input: true, output: false },
            false,
        )
        .unwrap();
        assert_eq!(pair.input, None);
        assert_eq!(pair.output.as_deref(), Some(std::path::Path::new("out.sdf")));
        assert!(!pair.in_place);
    }

    #[test]
    fn test_missing_input_is_an_error() {
        assert!(process_filenames("sdf_test", None, None, PipeFlags::NONE, false).is_err());
    }
}
