use clap::Parser;
use clap::builder::NonEmptyStringValueParser;
use etl::types::DatasetRef;

/// Replicates every table of a BigQuery dataset as a view in another dataset.
#[derive(Debug, Parser)]
#[command(name = "view-replicator", version)]
pub struct AppArgs {
    /// Project containing the source dataset.
    #[arg(value_parser = NonEmptyStringValueParser::new())]
    pub source_project: String,

    /// Dataset whose tables are replicated, within the source project.
    #[arg(value_parser = NonEmptyStringValueParser::new())]
    pub source_dataset_suffix: String,

    /// Project containing the target dataset.
    #[arg(value_parser = NonEmptyStringValueParser::new())]
    pub target_project: String,

    /// Dataset in which views are created, within the target project.
    #[arg(value_parser = NonEmptyStringValueParser::new())]
    pub target_dataset_suffix: String,
}

impl AppArgs {
    pub fn source_dataset(&self) -> DatasetRef {
        DatasetRef::new(&self.source_project, &self.source_dataset_suffix)
    }

    pub fn target_dataset(&self) -> DatasetRef {
        DatasetRef::new(&self.target_project, &self.target_dataset_suffix)
    }
}

#[cfg(test)]
mod tests {
    use clap::error::ErrorKind;

    use super::*;

    #[test]
    fn test_parse_four_positional_arguments() {
        let args =
            AppArgs::try_parse_from(["view-replicator", "src-proj", "raw", "tgt-proj", "secure"])
                .unwrap();

        assert_eq!(args.source_dataset().to_string(), "src-proj.raw");
        assert_eq!(args.target_dataset().to_string(), "tgt-proj.secure");
    }

    const ARGUMENTS: [(&str, &str); 4] = [
        ("SOURCE_PROJECT", "src-proj"),
        ("SOURCE_DATASET_SUFFIX", "raw"),
        ("TARGET_PROJECT", "tgt-proj"),
        ("TARGET_DATASET_SUFFIX", "secure"),
    ];

    #[test]
    fn test_missing_argument_is_rejected_at_every_position() {
        for (provided, (missing, _)) in ARGUMENTS.iter().enumerate() {
            let argv = std::iter::once("view-replicator")
                .chain(ARGUMENTS[..provided].iter().map(|(_, value)| *value));

            let err = AppArgs::try_parse_from(argv).unwrap_err();

            assert_eq!(
                err.kind(),
                ErrorKind::MissingRequiredArgument,
                "with {provided} arguments"
            );
            assert!(
                err.to_string().contains(missing),
                "expected {missing} to be reported missing: {err}"
            );
        }
    }

    #[test]
    fn test_empty_argument_is_rejected_at_every_position() {
        for position in 0..ARGUMENTS.len() {
            let argv = std::iter::once("view-replicator").chain(
                ARGUMENTS
                    .iter()
                    .enumerate()
                    .map(|(i, (_, value))| if i == position { "" } else { *value }),
            );

            let err = AppArgs::try_parse_from(argv).unwrap_err();

            assert_eq!(err.kind(), ErrorKind::InvalidValue, "at position {position}");
        }
    }

    #[test]
    fn test_extra_argument_is_rejected() {
        let err = AppArgs::try_parse_from([
            "view-replicator",
            "src-proj",
            "raw",
            "tgt-proj",
            "secure",
            "extra",
        ])
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }
}
