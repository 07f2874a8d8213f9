//! Flight Validation Tests
//!
//! End-to-end checks of the control core against simulated drivers:
//! 1. Controller output and integral limits hold for arbitrary inputs
//! 2. Both estimators keep a unit quaternion and track the true attitude
//! 3. The attitude cascade drives the mixer in the corrective direction
//! 4. The position loop works in the captured local frame

use approx::assert_relative_eq;
use nalgebra::{UnitQuaternion, Vector3};
use std::f32::consts::FRAC_PI_2;

use quadctl_core::config::FlightConfig;
use quadctl_core::control::{
    mix_x_quad, Chassis, ChassisConfig, ChassisDependencies, ControllerBank, Move, MoveConfig,
    MoveDependencies, MotorPosition, PidConfig, PidController, PidMode, PidType,
};
use quadctl_core::estimation::{
    AttitudeEstimator, AttitudeManager, EkfConfig, Estimator, MahonyConfig, MahonyFilter,
    QuaternionEkf,
};
use quadctl_core::hal::{Imu, Motor, PositioningSensor};
use quadctl_core::math::{gravity_in_body, quaternion_from_euler, quaternion_norm};
use quadctl_core::simulation::{ImuNoiseConfig, SimImu, SimMotor, SimPositioning, SimpleRng};
use quadctl_core::GRAVITY;

fn level_accel() -> Vector3<f32> {
    Vector3::new(0.0, 0.0, GRAVITY)
}

fn attach(motors: &mut [SimMotor; 4]) -> [Option<&mut dyn Motor>; 4] {
    motors.each_mut().map(|m| Some(m as &mut dyn Motor))
}

/// Output and integral saturation under random excitation
mod pid_limit_tests {
    use super::*;

    #[test]
    fn test_output_never_exceeds_limit() {
        let plain = PidConfig::with_gains(3.0, 0.8, 0.5).limits(10.0, 4.0);
        let filtered = plain.diff_filter(500.0, 50.0, 0.707);
        let modes = [PidMode::Position, PidMode::Incremental];
        let kinds = [PidType::P, PidType::PI, PidType::PD, PidType::PID];

        for config in [plain, filtered] {
            for mode in modes {
                for kind in kinds {
                    let mut pid = PidController::new(config);
                    let mut rng = SimpleRng::new(7);

                    for _ in 0..5000 {
                        let target = (rng.next_f32() - 0.5) * 200.0;
                        let actual = (rng.next_f32() - 0.5) * 200.0;
                        pid.set_target(target);
                        let out = pid.update(actual, mode, kind);
                        assert!(out.abs() <= 10.0 + 1e-4, "{mode:?} {kind:?}: {out}");
                        assert!((pid.state().integral * config.ki).abs() <= 4.0 + 1e-3);
                    }
                }
            }
        }
    }

    #[test]
    fn test_incremental_output_saturates_and_recovers() {
        let config = PidConfig::with_gains(2.0, 0.5, 0.0).limits(10.0, 4.0);
        let mut pid = PidController::new(config);

        // A persistent error keeps adding onto the previous output
        pid.set_target(5.0);
        for _ in 0..200 {
            let out = pid.update(0.0, PidMode::Incremental, PidType::PI);
            assert!(out.abs() <= 10.0 + 1e-4);
        }
        assert_relative_eq!(pid.output(), 10.0, epsilon = 1e-4);

        pid.set_target(-5.0);
        for _ in 0..200 {
            let out = pid.update(0.0, PidMode::Incremental, PidType::PI);
            assert!(out.abs() <= 10.0 + 1e-4);
        }
        assert_relative_eq!(pid.output(), -10.0, epsilon = 1e-4);
    }

    #[test]
    fn test_filtered_derivative_stays_bounded() {
        let config = PidConfig::with_gains(1.0, 0.0, 2.0)
            .limits(5.0, 0.0)
            .diff_filter(500.0, 50.0, 0.707);
        let mut pid = PidController::new(config);

        // Alternating step input: worst case for the derivative term
        for i in 0..1000 {
            let target = if i % 2 == 0 { 1.0 } else { -1.0 };
            let out = pid.step(target, 0.0);
            assert!(out.is_finite());
            assert!(out.abs() <= 5.0 + 1e-4);
        }
    }
}

/// Estimator behavior against simulated IMU data
mod estimator_tests {
    use super::*;

    #[test]
    fn test_mahony_stationary_level_stays_level() {
        let mut filter = MahonyFilter::new(MahonyConfig::default());
        filter.init(Some(&level_accel()), None);

        for _ in 0..10_000 {
            filter.update(&Vector3::zeros(), &level_accel(), None);
        }

        let q = filter.quaternion();
        assert_relative_eq!(q.angle(), 0.0, epsilon = 1e-4);
        assert_relative_eq!(quaternion_norm(&q), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_quaternion_norm_under_random_rates() {
        let mut rng = SimpleRng::new(99);
        let mut mahony = MahonyFilter::new(MahonyConfig::default());
        let mut ekf = QuaternionEkf::new(EkfConfig::default());

        for _ in 0..5000 {
            let gyro = rng.next_gaussian_vec3(2.0);
            let accel = level_accel() + rng.next_gaussian_vec3(1.0);
            mahony.update(&gyro, &accel, None);
            ekf.update(&gyro, &accel, None);

            assert_relative_eq!(quaternion_norm(&mahony.quaternion()), 1.0, epsilon = 1e-4);
            assert_relative_eq!(quaternion_norm(&ekf.quaternion()), 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_ekf_learns_bias_from_noisy_imu() {
        let bias = Vector3::new(0.02, -0.015, 0.0);
        let mut imu = SimImu::new(ImuNoiseConfig {
            gyro_noise_std: 0.001,
            accel_noise_std: 0.01,
            seed: 2024,
        });
        imu.set_gyro_bias(bias);

        let mut ekf = QuaternionEkf::new(EkfConfig::default());
        let seed = imu.read();
        ekf.init(Some(&seed.accel), None);

        let mut sum = Vector3::zeros();
        let mut samples = 0.0;
        for i in 0..15_000 {
            let sample = imu.read();
            ekf.update(&sample.gyro, &sample.accel, None);
            // Average out the per-sample jitter at the end of the run
            if i >= 14_000 {
                sum += ekf.gyro_bias();
                samples += 1.0;
            }
        }
        let mean = sum / samples;

        assert_relative_eq!(mean.x, bias.x, epsilon = 5e-3);
        assert_relative_eq!(mean.y, bias.y, epsilon = 5e-3);
        assert_relative_eq!(ekf.euler().roll, 0.0, epsilon = 3e-2);
        assert_relative_eq!(ekf.euler().pitch, 0.0, epsilon = 3e-2);
    }

    #[test]
    fn test_both_estimators_agree_on_static_tilt() {
        let truth = quaternion_from_euler(0.15, -0.25, 0.0);
        let accel = gravity_in_body(&truth, GRAVITY);

        let mut estimators = [
            Estimator::from(MahonyFilter::new(MahonyConfig::default())),
            Estimator::from(QuaternionEkf::new(EkfConfig::default())),
        ];
        for est in estimators.iter_mut() {
            est.init(None, None);
            // Long enough for the Mahony integral term to bleed off
            for _ in 0..25_000 {
                est.update(&Vector3::zeros(), &accel, None);
            }
            let e = est.euler();
            assert_relative_eq!(e.roll, 0.15, epsilon = 1e-2);
            assert_relative_eq!(e.pitch, -0.25, epsilon = 1e-2);
        }
    }
}

/// Attitude manager feeding the chassis
mod stabilization_tests {
    use super::*;

    #[test]
    fn test_mixer_symmetry() {
        for &(roll, pitch, yaw) in &[(3.0, 0.0, 0.0), (0.0, -4.0, 0.0), (0.0, 0.0, 2.5), (1.0, 2.0, -3.0)] {
            let out = mix_x_quad(50.0, roll, pitch, yaw, 100.0);
            let total: f32 = out.iter().sum();
            // Differential commands never change the collective
            assert_relative_eq!(total, 200.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_tilted_airframe_commands_recovery() {
        let mut imu = SimImu::ideal();
        imu.set_orientation(quaternion_from_euler(0.2, 0.0, 0.0));
        let imu: &mut dyn Imu = &mut imu;

        let mut manager = AttitudeManager::new(
            Some(imu),
            Some(MahonyFilter::new(MahonyConfig::default()).into()),
        );
        manager.init().unwrap();
        for _ in 0..100 {
            manager.update();
        }
        assert_relative_eq!(manager.euler().roll, 0.2, epsilon = 1e-2);

        let mut bank = ControllerBank::new(&FlightConfig::default());
        let mut motors = [SimMotor::default(); 4];
        {
            let lent = bank.lend();
            let mut chassis = Chassis::new(
                ChassisDependencies {
                    motors: attach(&mut motors),
                    angle_pids: lent.angle,
                    rate_pids: lent.rate,
                },
                ChassisConfig::default(),
            );
            chassis.init().unwrap();
            chassis.set_throttle_override(40.0);
            chassis.set_target_attitude(0.0, 0.0, 0.0);
            chassis.update(&manager);
        }

        // Rolled right: the right-hand motors push harder
        let right = motors[MotorPosition::FrontRight.index()].throttle()
            + motors[MotorPosition::RearRight.index()].throttle();
        let left = motors[MotorPosition::FrontLeft.index()].throttle()
            + motors[MotorPosition::RearLeft.index()].throttle();
        assert!(right > left);
    }

    #[test]
    fn test_level_airframe_spins_motors_evenly() {
        let mut imu = SimImu::ideal();
        imu.set_orientation(UnitQuaternion::identity());
        let imu: &mut dyn Imu = &mut imu;
        let mut manager = AttitudeManager::new(
            Some(imu),
            Some(QuaternionEkf::new(EkfConfig::default()).into()),
        );
        manager.init().unwrap();
        manager.update();

        let mut bank = ControllerBank::default();
        let mut motors = [SimMotor::default(); 4];
        {
            let lent = bank.lend();
            let mut chassis = Chassis::new(
                ChassisDependencies {
                    motors: attach(&mut motors),
                    angle_pids: lent.angle,
                    rate_pids: lent.rate,
                },
                ChassisConfig::default(),
            );
            chassis.init().unwrap();
            chassis.set_throttle_override(30.0);
            chassis.update(&manager);
        }

        for m in &motors {
            assert_relative_eq!(m.throttle(), 30.0, epsilon = 1e-3);
        }
    }
}

/// Position loop in the captured local frame
mod position_loop_tests {
    use super::*;

    #[test]
    fn test_origin_capture_rotates_frame() {
        let sensor = SimPositioning::new();
        sensor.set_position(1.0, 1.0, 0.0);
        sensor.set_yaw(FRAC_PI_2);
        let sensor_ref: &dyn PositioningSensor = &sensor;

        let mut bank = ControllerBank::default();
        let lent = bank.lend();
        let mut mv = Move::new(
            MoveDependencies {
                sensor: Some(sensor_ref),
                position_pids: lent.position,
                velocity_pids: lent.velocity,
            },
            MoveConfig::default(),
        );
        mv.init().unwrap();
        mv.set_current_as_origin().unwrap();
        mv.update();

        let here = mv.current_pose();
        assert_relative_eq!(here.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(here.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(here.yaw, 0.0, epsilon = 1e-5);

        // Local forward is ground +Y after the capture
        mv.set_target_position(1.0, 0.0, 0.0);
        mv.update();
        assert!(mv.command().pitch > 0.0);
        assert_relative_eq!(mv.command().roll, 0.0, epsilon = 1e-5);

        sensor.set_position(1.0, 2.0, 0.0);
        mv.update();
        let here = mv.current_pose();
        assert_relative_eq!(here.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(here.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(mv.target_heading(), FRAC_PI_2, epsilon = 1e-5);
    }

    #[test]
    fn test_commands_respect_limits() {
        let sensor = SimPositioning::new();
        let sensor_ref: &dyn PositioningSensor = &sensor;
        let mut bank = ControllerBank::default();
        let lent = bank.lend();
        let config = MoveConfig::default();
        let mut mv = Move::new(
            MoveDependencies {
                sensor: Some(sensor_ref),
                position_pids: lent.position,
                velocity_pids: lent.velocity,
            },
            config,
        );
        mv.init().unwrap();
        mv.set_target_position(50.0, -50.0, 20.0);

        for _ in 0..500 {
            mv.update();
            let cmd = mv.command();
            assert!(cmd.pitch.abs() <= config.max_tilt + 1e-6);
            assert!(cmd.roll.abs() <= config.max_tilt + 1e-6);
            assert!(cmd.throttle.abs() <= config.max_throttle + 1e-4);
        }
    }
}
