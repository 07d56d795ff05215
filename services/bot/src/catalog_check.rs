use clap::Args;
use hr_intake::error::AppError;
use hr_intake::workflows::intake::persister::missing_columns;
use hr_intake::workflows::intake::{
    build_catalog, ColumnLayout, CsvCatalogSource, OpeningCatalog,
};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct CatalogCheckArgs {
    /// CSV export of the openings tab (`code,title,order,key,question`)
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// Responses header to compare question keys against, comma separated
    #[arg(long)]
    pub(crate) responses_header: Option<String>,
}

pub(crate) fn run_catalog_check(args: CatalogCheckArgs) -> Result<(), AppError> {
    let source = CsvCatalogSource::from_path(&args.csv)?;
    let catalog = build_catalog(source.rows().to_vec())?;
    print!("{}", render_catalog(&catalog));

    if let Some(header) = args.responses_header {
        let header: Vec<String> = header.split(',').map(|name| name.trim().to_string()).collect();
        let layout = ColumnLayout::from_header(header);
        let missing = missing_columns(&catalog, layout.columns());
        if missing.is_empty() {
            println!("Every question key has a Responses column.");
        } else {
            let keys: Vec<_> = missing.into_iter().collect();
            println!("Missing Responses columns: {}", keys.join(", "));
        }
    }
    Ok(())
}

fn render_catalog(catalog: &OpeningCatalog) -> String {
    let summary = catalog.summary();
    let mut out = format!(
        "{} openings, {} questions\n",
        summary.openings, summary.questions
    );
    for opening in catalog.iter() {
        out.push_str(&format!("- {} [{}]\n", opening.title, opening.id));
        if opening.questions.is_empty() {
            out.push_str("    (no questions, goes straight to the resume link)\n");
        }
        for (position, question) in opening.questions.iter().enumerate() {
            out.push_str(&format!(
                "    {}. {} -> {}\n",
                position + 1,
                question.key,
                question.prompt
            ));
        }
    }
    out
}
