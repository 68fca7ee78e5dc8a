use std::collections::HashMap;

use uuid::Uuid;

use crate::grading::{letter_grade, round2};
use crate::models::{Category, Score, Student, StudentScoreReport, Weight};

/// Everything one score recap reads. Borrowed, never mutated.
#[derive(Debug, Clone, Copy)]
pub struct ScoreSnapshot<'a> {
    pub students: &'a [Student],
    pub scores: &'a [Score],
    pub categories: &'a [Category],
    pub weights: &'a [Weight],
}

#[derive(Debug, Clone, Copy)]
pub struct ScoreFilter {
    pub subject_id: Uuid,
    pub class_id: Option<Uuid>,
}

/// One row per matching student, in input order.
pub fn build_score_report(
    snapshot: ScoreSnapshot<'_>,
    filter: ScoreFilter,
) -> Vec<StudentScoreReport> {
    let subject_scores: Vec<&Score> = snapshot
        .scores
        .iter()
        .filter(|score| score.subject_id == filter.subject_id)
        .collect();

    let reports: Vec<StudentScoreReport> = snapshot
        .students
        .iter()
        .filter(|student| filter.class_id.map_or(true, |class_id| student.class_id == class_id))
        .map(|student| {
            let averages = category_averages(student.id, &subject_scores, snapshot.categories);
            let final_score = weighted_final_score(&averages, snapshot.weights);
            // Graded on the rounded score, so 89.996 shows as 90.00 and grades A.
            StudentScoreReport {
                student: student.clone(),
                scores: averages,
                final_score,
                grade: letter_grade(final_score),
            }
        })
        .collect();

    tracing::debug!(
        subject_id = %filter.subject_id,
        students = reports.len(),
        scores = subject_scores.len(),
        "Built score recap"
    );

    reports
}

/// Simple mean per category. Categories with no scores are left out.
pub fn category_averages(
    student_id: Uuid,
    scores: &[&Score],
    categories: &[Category],
) -> HashMap<Uuid, f64> {
    let mut sums: HashMap<Uuid, (f64, usize)> = HashMap::new();

    for score in scores.iter().filter(|s| s.student_id == student_id) {
        let entry = sums.entry(score.category_id).or_insert((0.0, 0));
        entry.0 += score.score;
        entry.1 += 1;
    }

    categories
        .iter()
        .filter_map(|category| {
            sums.get(&category.id)
                .map(|(total, count)| (category.id, total / *count as f64))
        })
        .collect()
}

/// Weighted sum over categories that have both a weight and an average,
/// projected onto a 100% basis when the applicable weights do not total 100.
pub fn weighted_final_score(averages: &HashMap<Uuid, f64>, weights: &[Weight]) -> f64 {
    let mut final_score = 0.0;
    let mut total_weight = 0.0;

    for weight in weights {
        if let Some(average) = averages.get(&weight.category_id) {
            final_score += average * (weight.weight_percent / 100.0);
            total_weight += weight.weight_percent;
        }
    }

    if total_weight <= 0.0 {
        return 0.0;
    }
    if total_weight != 100.0 {
        final_score = final_score * 100.0 / total_weight;
    }

    round2(final_score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::Grade;
    use proptest::prelude::*;

    fn student(name: &str, class_id: Uuid) -> Student {
        Student {
            id: Uuid::new_v4(),
            name: name.to_string(),
            nis: format!("nis-{name}"),
            class_id,
            class_name: None,
        }
    }

    fn category(name: &str) -> Category {
        Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: String::new(),
        }
    }

    fn weight(category: &Category, percent: f64) -> Weight {
        Weight {
            id: Uuid::new_v4(),
            category_id: category.id,
            weight_percent: percent,
            category_name: Some(category.name.clone()),
        }
    }

    fn score(student: &Student, subject_id: Uuid, category: &Category, value: f64) -> Score {
        Score {
            id: Uuid::new_v4(),
            student_id: student.id,
            subject_id,
            category_id: category.id,
            assessment_name: format!("{} #{value}", category.name),
            score: value,
        }
    }

    #[test]
    fn weighted_example_without_rescale() {
        let class_id = Uuid::new_v4();
        let subject_id = Uuid::new_v4();
        let uh1 = category("UH1");
        let uts = category("UTS");
        let avery = student("Avery", class_id);

        let students = vec![avery.clone()];
        let categories = vec![uh1.clone(), uts.clone()];
        let weights = vec![weight(&uh1, 40.0), weight(&uts, 60.0)];
        let scores = vec![
            score(&avery, subject_id, &uh1, 80.0),
            score(&avery, subject_id, &uh1, 90.0),
            score(&avery, subject_id, &uts, 70.0),
        ];

        let reports = build_score_report(
            ScoreSnapshot {
                students: &students,
                scores: &scores,
                categories: &categories,
                weights: &weights,
            },
            ScoreFilter {
                subject_id,
                class_id: None,
            },
        );

        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.scores[&uh1.id], 85.0);
        assert_eq!(report.scores[&uts.id], 70.0);
        assert_eq!(report.final_score, 76.0);
        assert_eq!(report.grade, Grade::C);
    }

    #[test]
    fn partial_weights_are_projected_to_full_scale() {
        let uh1 = category("UH1");
        let uts = category("UTS");
        let averages = HashMap::from([(uh1.id, 85.0), (uts.id, 70.0)]);

        // 85*0.2 + 70*0.4 = 45 over a 60% basis
        let result = weighted_final_score(&averages, &[weight(&uh1, 20.0), weight(&uts, 40.0)]);
        assert_eq!(result, 75.0);
    }

    #[test]
    fn unscored_weights_and_unweighted_scores_do_not_contribute() {
        let uh1 = category("UH1");
        let uts = category("UTS");
        let uas = category("UAS");
        let averages = HashMap::from([(uh1.id, 90.0), (uas.id, 10.0)]);

        // UTS is weighted but unscored, UAS is scored but unweighted:
        // only UH1 remains and it is rescaled to the full basis.
        let result = weighted_final_score(&averages, &[weight(&uh1, 40.0), weight(&uts, 60.0)]);
        assert_eq!(result, 90.0);
    }

    #[test]
    fn no_weights_gives_zero_and_e() {
        let class_id = Uuid::new_v4();
        let subject_id = Uuid::new_v4();
        let uh1 = category("UH1");
        let avery = student("Avery", class_id);
        let students = vec![avery.clone()];
        let categories = vec![uh1.clone()];
        let scores = vec![score(&avery, subject_id, &uh1, 95.0)];

        let reports = build_score_report(
            ScoreSnapshot {
                students: &students,
                scores: &scores,
                categories: &categories,
                weights: &[],
            },
            ScoreFilter {
                subject_id,
                class_id: None,
            },
        );

        assert_eq!(reports[0].scores[&uh1.id], 95.0);
        assert_eq!(reports[0].final_score, 0.0);
        assert_eq!(reports[0].grade, Grade::E);
    }

    #[test]
    fn filters_by_subject_and_class_keeping_student_order() {
        let class_a = Uuid::new_v4();
        let class_b = Uuid::new_v4();
        let math = Uuid::new_v4();
        let art = Uuid::new_v4();
        let uh1 = category("UH1");
        let jules = student("Jules", class_a);
        let kiara = student("Kiara", class_b);
        let avery = student("Avery", class_a);

        let students = vec![jules.clone(), kiara.clone(), avery.clone()];
        let categories = vec![uh1.clone()];
        let weights = vec![weight(&uh1, 100.0)];
        let scores = vec![
            score(&jules, math, &uh1, 60.0),
            score(&jules, art, &uh1, 100.0),
            score(&kiara, math, &uh1, 99.0),
        ];

        let reports = build_score_report(
            ScoreSnapshot {
                students: &students,
                scores: &scores,
                categories: &categories,
                weights: &weights,
            },
            ScoreFilter {
                subject_id: math,
                class_id: Some(class_a),
            },
        );

        let names: Vec<&str> = reports.iter().map(|r| r.student.name.as_str()).collect();
        assert_eq!(names, vec!["Jules", "Avery"]);
        assert_eq!(reports[0].final_score, 60.0);
        assert_eq!(reports[0].grade, Grade::D);
        assert!(reports[1].scores.is_empty());
        assert_eq!(reports[1].final_score, 0.0);
        assert_eq!(reports[1].grade, Grade::E);
    }

    #[test]
    fn grade_follows_the_rounded_score() {
        let subject_id = Uuid::new_v4();
        let uh1 = category("UH1");
        let avery = student("Avery", Uuid::new_v4());
        let students = vec![avery.clone()];
        let categories = vec![uh1.clone()];
        let weights = vec![weight(&uh1, 100.0)];
        let scores = vec![score(&avery, subject_id, &uh1, 89.996)];

        let reports = build_score_report(
            ScoreSnapshot {
                students: &students,
                scores: &scores,
                categories: &categories,
                weights: &weights,
            },
            ScoreFilter {
                subject_id,
                class_id: None,
            },
        );

        assert_eq!(reports[0].scores[&uh1.id], 89.996);
        assert_eq!(reports[0].final_score, 90.0);
        assert_eq!(reports[0].grade, Grade::A);
    }

    #[test]
    fn scores_for_unknown_categories_are_ignored() {
        let uh1 = category("UH1");
        let stray = category("Stray");
        let avery = student("Avery", Uuid::new_v4());
        let subject_id = Uuid::new_v4();
        let scores = [
            score(&avery, subject_id, &uh1, 80.0),
            score(&avery, subject_id, &stray, 10.0),
        ];
        let refs: Vec<&Score> = scores.iter().collect();

        let averages = category_averages(avery.id, &refs, &[uh1.clone()]);
        assert_eq!(averages.len(), 1);
        assert_eq!(averages[&uh1.id], 80.0);
    }

    proptest! {
        #[test]
        fn full_weight_sets_are_not_rescaled(a in 0.0f64..=100.0, b in 0.0f64..=100.0, w in 0u32..=100) {
            let first = category("first");
            let second = category("second");
            let averages = HashMap::from([(first.id, a), (second.id, b)]);
            let w = f64::from(w);
            let weights = [weight(&first, w), weight(&second, 100.0 - w)];

            let direct = round2(a * (w / 100.0) + b * ((100.0 - w) / 100.0));
            prop_assert_eq!(weighted_final_score(&averages, &weights), direct);
        }

        #[test]
        fn normalization_is_scale_invariant(
            a in 0.0f64..=100.0,
            b in 0.0f64..=100.0,
            wa in 1u32..=60,
            wb in 1u32..=60,
            k in 1u32..=4,
        ) {
            let first = category("first");
            let second = category("second");
            let averages = HashMap::from([(first.id, a), (second.id, b)]);
            let (wa, wb, k) = (f64::from(wa), f64::from(wb), f64::from(k) * 0.5);

            let base = weighted_final_score(&averages, &[weight(&first, wa), weight(&second, wb)]);
            let scaled = weighted_final_score(
                &averages,
                &[weight(&first, wa * k), weight(&second, wb * k)],
            );
            let expected = (a * wa + b * wb) / (wa + wb);

            prop_assert!((base - expected).abs() <= 0.005 + 1e-9);
            prop_assert!((base - scaled).abs() <= 0.01 + 1e-9);
        }

        #[test]
        fn students_without_scores_always_fail(w in 0u32..=100) {
            let first = category("first");
            let result = weighted_final_score(&HashMap::new(), &[weight(&first, f64::from(w))]);
            prop_assert_eq!(result, 0.0);
            prop_assert_eq!(letter_grade(result), Grade::E);
        }
    }
}
