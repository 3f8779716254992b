use crate::core::error::Result;
use crate::core::stats::BasicStatistics;
use crate::report::export::write_atomic;
use std::fmt::Write;
use std::path::Path;

pub fn write(path: &Path, summary: &BasicStatistics, kept_reads: usize) -> Result<()> {
    let text = render(summary, kept_reads)?;
    write_atomic(path, text.as_bytes())
}

pub fn render(s: &BasicStatistics, kept_reads: usize) -> Result<String> {
    let mut w = String::new();
    writeln!(w, "ReadsNumber\t{}", s.reads_number)?;
    if s.bases_number > 1_000_000_000 {
        writeln!(w, "BaseNumber\t{:.9}Gb", s.bases_number as f64 / 1e9)?;
    } else {
        writeln!(w, "BaseNumber\t{:.6}Mb", s.bases_number as f64 / 1e6)?;
    }
    writeln!(w, "N10\t{}", s.n10 as u64)?;
    writeln!(w, "N50\t{}", s.n50 as u64)?;
    writeln!(w, "N90\t{}", s.n90 as u64)?;
    writeln!(w, "ReadMinLen\t{}", s.min_len)?;
    writeln!(w, "ReadMaxLen\t{}", s.max_len)?;
    writeln!(w, "ReadMeanLen\t{:.2}", s.mean_len)?;
    writeln!(w, "ReadLenStd\t{:.2}", s.std_len)?;
    for (name, v) in ["25", "50", "75"].iter().zip(s.len_quartiles) {
        writeln!(w, "ReadLenQuantile{}\t{:.1}", name, v)?;
    }
    writeln!(w, "ReadMeanQual\t{:.2}", s.mean_qual)?;
    writeln!(w, "ReadModeQual\t{:.2}", s.mode_qual)?;
    writeln!(w, "ReadMinQual\t{:.2}", s.min_qual)?;
    writeln!(w, "ReadMaxQual\t{:.2}", s.max_qual)?;
    for (name, v) in ["25", "50", "75"].iter().zip(s.qual_quartiles) {
        writeln!(w, "ReadQualQuantile{}\t{:.2}", name, v)?;
    }

    writeln!(
        w,
        "#ReadLength > SpecifiedValue\tReadsNumber(ReadsPercent); BasesNumber(BasesPercent)"
    )?;
    for row in &s.length_thresholds {
        writeln!(
            w,
            "ReadLength > {}\t{}",
            row.threshold,
            share(row.reads, row.bases, s)
        )?;
    }
    writeln!(
        w,
        "#ReadQuality > SpecifiedValue\tReadsNumber(ReadsPercent); BasesNumber(BasesPercent)"
    )?;
    for row in &s.quality_thresholds {
        writeln!(
            w,
            "ReadQuality > {}\t{}",
            row.threshold,
            share(row.reads, row.bases, s)
        )?;
    }
    writeln!(
        w,
        "ReadsKeptForPlot\t{}({:.2}%)",
        kept_reads,
        pct(kept_reads as f64, s.reads_number as f64)
    )?;
    Ok(w)
}

fn share(reads: usize, bases: u128, s: &BasicStatistics) -> String {
    format!(
        "{}({:.2}%); {:.6}Mb({:.2}%)",
        reads,
        pct(reads as f64, s.reads_number as f64),
        bases as f64 / 1e6,
        pct(bases as f64, s.bases_number as f64)
    )
}

fn pct(part: f64, total: f64) -> f64 {
    if total == 0.0 { 0.0 } else { part / total * 100.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{Measurement, NxConvention};

    #[test]
    fn renders_core_lines() {
        let m: Vec<Measurement> = [(1000, 10.0), (2000, 12.0), (1500, 11.0), (5000, 9.0)]
            .iter()
            .map(|&(l, q)| Measurement::new(l, q))
            .collect();
        let s = BasicStatistics::compute(&m, NxConvention::default()).unwrap();
        let text = render(&s, 3).unwrap();
        assert!(text.contains("ReadsNumber\t4\n"));
        assert!(text.contains("BaseNumber\t0.009500Mb\n"));
        assert!(text.contains("N50\t5000\n"));
        assert!(text.contains("ReadMeanLen\t2375.00\n"));
        assert!(text.contains("ReadLength > 1000\t3(75.00%); 0.008500Mb(89.47%)\n"));
        assert!(text.contains("ReadsKeptForPlot\t3(75.00%)\n"));
    }
}
